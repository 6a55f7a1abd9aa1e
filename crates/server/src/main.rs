use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use toolguard_mcp::{Downstream, Proxy, SpawnSpec, StdioDownstream, ToolGateway};
use toolguard_sdk::GuardClient;

mod config;
mod identity;

use config::{ConfigError, Overrides, ProxyConfig};
use identity::{Credentials, IdentitySource};

/// Prefix of the proxy's own settings, never passed on to the wrapped server
const ENV_PREFIX: &str = "TOOLGUARD_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "toolguard")]
#[command(about = "MCP proxy that screens tool calls with a content policy", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "toolguard.toml")]
    config: PathBuf,

    /// Log output format (logs go to stderr)
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Decision service base URL
    #[arg(long, env = "TOOLGUARD_POLICY_BASE_URL")]
    policy_base_url: Option<String>,

    /// Application identity reported with every evaluation
    #[arg(long, env = "TOOLGUARD_APP_ID")]
    app_id: Option<String>,

    #[arg(long, env = "TOOLGUARD_POLICY_TOKEN", hide_env_values = true)]
    policy_token: Option<String>,

    #[arg(long, env = "TOOLGUARD_VAULT_TOKEN", hide_env_values = true)]
    vault_token: Option<String>,

    #[arg(long, env = "TOOLGUARD_VAULT_ITEM_ID")]
    vault_item_id: Option<String>,

    /// Downstream MCP server command and its arguments
    #[arg(last = true, required = true, num_args = 1..)]
    command: Vec<String>,
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "toolguard=info".into());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.with_target(true).init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log_format);

    let config = ProxyConfig::load(&args.config)?.with_overrides(Overrides {
        policy_base_url: args.policy_base_url,
        app_id: args.app_id,
    });
    let credentials = Credentials {
        policy_token: args.policy_token,
        vault_token: args.vault_token,
        vault_item_id: args.vault_item_id,
    };

    let mut command = args.command.into_iter();
    let program = command.next().context("missing downstream server command")?;
    let mut spec = SpawnSpec::new(program, command.collect());
    spec.env_remove = std::env::vars_os()
        .filter_map(|(key, _)| key.into_string().ok())
        .filter(|key| key.starts_with(ENV_PREFIX))
        .collect();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting toolguard");

    let (downstream, notifications) = StdioDownstream::spawn(&spec, config.handshake_timeout())
        .await
        .context("failed to connect to downstream server")?;
    let downstream = Arc::new(downstream);

    let gateway = if downstream.capabilities().tools.is_some() {
        Some(build_gateway(&config, credentials, downstream.clone()).await?)
    } else {
        tracing::info!("downstream server advertises no tools, policy checks disabled");
        None
    };

    let proxy = Arc::new(Proxy::new(downstream.clone(), gateway)?);
    let outcome = proxy
        .serve(tokio::io::stdin(), tokio::io::stdout(), notifications, shutdown_signal())
        .await;

    downstream.close().await;
    tracing::info!("toolguard stopped");

    outcome.context("proxy session failed")
}

async fn build_gateway(
    config: &ProxyConfig,
    credentials: Credentials,
    downstream: Arc<StdioDownstream>,
) -> Result<ToolGateway> {
    let source = IdentitySource::select(credentials, config)?.ok_or(ConfigError::MissingIdentity)?;
    let identity = source
        .resolve(config.policy_timeout())
        .await
        .context("failed to resolve policy identity")?;

    let client = GuardClient::builder()
        .base_url(config.policy_base_url()?)
        .identity(&identity)
        .timeout(config.policy_timeout())
        .build()
        .context("failed to create policy client")?;
    tracing::info!(policy_url = %client.base_url(), "policy checks enabled for tools");

    Ok(ToolGateway::new(downstream, Arc::new(client), config.guard_config()))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

// Demo MCP server with mock weather, sports and echo tools, served over stdio

use anyhow::Result;
use std::sync::Arc;
use toolguard_mcp::protocol::ServerInfo;
use toolguard_mcp::server::McpServer;
use toolguard_mcp::tools::{EchoTool, ScoreboardTool, ToolRegistry, WeatherTool};

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries the protocol; logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(WeatherTool));
    registry.register(Arc::new(ScoreboardTool));
    registry.register(Arc::new(EchoTool));

    let server = McpServer::new(
        registry,
        ServerInfo {
            name: "Toolguard Demo Tools".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
    );
    server.serve(tokio::io::stdin(), tokio::io::stdout()).await?;

    Ok(())
}

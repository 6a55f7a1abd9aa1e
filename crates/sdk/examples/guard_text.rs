//! Screen a piece of text with the decision service.
//!
//! Reads the service URL and token from TOOLGUARD_POLICY_BASE_URL and
//! TOOLGUARD_POLICY_TOKEN, then evaluates the text given on the command line
//! as tool output under the default output recipe.
//!
//! Run with: cargo run --example guard_text -- "the secret is 7"

use std::time::Duration;
use toolguard_sdk::{GuardClient, GuardClientError, GuardClientResult, GuardContext, GuardRequest, Message};

#[tokio::main]
async fn main() -> GuardClientResult<()> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let env = |key: &str| {
        std::env::var(key).map_err(|_| GuardClientError::Config(format!("{} is not set", key)))
    };

    let client = GuardClient::builder()
        .base_url(env("TOOLGUARD_POLICY_BASE_URL")?)
        .token(env("TOOLGUARD_POLICY_TOKEN")?)
        .timeout(Duration::from_secs(10))
        .build()?;

    let text = std::env::args().nth(1).unwrap_or_else(|| "hello world".to_string());
    let request = GuardRequest::message(
        Message::tool(text),
        "agent_post_tool_guard",
        GuardContext::new(Some("guard-text-example".to_string())).with_info("tool_name", "example"),
    );

    let verdict = client.guard().evaluate(&request).await?;
    println!("blocked:     {}", verdict.blocked);
    println!("transformed: {}", verdict.transformed);
    if let Some(content) = verdict.replacement() {
        println!("sanitized:   {}", content);
    }
    for (key, value) in verdict.disclosable_diagnostics() {
        println!("  {}: {}", key, value);
    }

    Ok(())
}

//! # Toolguard SDK
//!
//! HTTP client for the content-safety decision service that toolguard
//! consults before and after every tool invocation, and for the secret vault
//! that can hold the decision service credential.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use toolguard_core::{GuardContext, GuardRequest, Message};
//! use toolguard_sdk::{GuardClient, GuardClientResult};
//!
//! # async fn example() -> GuardClientResult<()> {
//! let client = GuardClient::builder()
//!     .base_url("https://ai-guard.example.com")
//!     .token("pts_your_token")
//!     .build()?;
//!
//! let request = GuardRequest::message(
//!     Message::user(r#"{"query":"weather in Paris"}"#),
//!     "agent_pre_tool_guard",
//!     GuardContext::default(),
//! );
//! let verdict = client.guard().evaluate(&request).await?;
//! println!("blocked: {}", verdict.blocked);
//! # Ok(())
//! # }
//! ```
//!
//! ## Resolving the credential from the vault
//!
//! ```rust,no_run
//! use toolguard_sdk::GuardClient;
//!
//! # async fn example() -> toolguard_sdk::GuardClientResult<()> {
//! let vault = GuardClient::builder()
//!     .base_url("https://vault.example.com")
//!     .token("pts_vault_token")
//!     .build()?;
//!
//! let identity = vault.vault().resolve_identity("pvi_item_id").await?;
//! # let _ = identity;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod transport;

// Re-export main client
pub use client::{GuardClient, GuardClientBuilder};
pub use config::ClientConfig;
pub use error::{GuardClientError, GuardClientResult};

// Re-export core policy types for convenience
pub use toolguard_core::{
    GuardContext, GuardPayload, GuardRequest, Message, PolicyIdentity, PolicySelector, Role,
    Verdict,
};

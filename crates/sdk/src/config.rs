//! Configuration types for the Toolguard SDK.

use std::time::Duration;
use url::Url;

/// Default request timeout for decision and vault calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for a decision-service or vault client.
///
/// Requests are never retried; a failed evaluation fails the owning tool
/// request.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the service.
    pub base_url: Url,
    /// Bearer token for authentication.
    pub token: Option<String>,
    /// Request timeout.
    pub timeout: Duration,
}

impl ClientConfig {
    /// Create a new configuration with the given base URL.
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            token: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

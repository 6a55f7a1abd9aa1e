//! Main client for the Toolguard SDK.

use crate::api::{GuardApi, VaultApi};
use crate::config::{ClientConfig, DEFAULT_TIMEOUT};
use crate::error::{GuardClientError, GuardClientResult};
use crate::transport::HttpTransport;
use std::sync::Arc;
use std::time::Duration;
use toolguard_core::{GuardRequest, PolicyError, PolicyEvaluator, PolicyIdentity, Verdict};
use url::Url;

/// Client for the decision service or the vault. One instance talks to one
/// base URL with one credential.
#[derive(Debug, Clone)]
pub struct GuardClient {
    config: Arc<ClientConfig>,
    pub(crate) http: HttpTransport,
}

impl GuardClient {
    /// Create a new client builder.
    pub fn builder() -> GuardClientBuilder {
        GuardClientBuilder::new()
    }

    /// Create a client from configuration.
    pub fn from_config(config: ClientConfig) -> GuardClientResult<Self> {
        let config = Arc::new(config);
        let http = HttpTransport::new(config.clone())?;

        Ok(Self { config, http })
    }

    /// Base URL this client talks to.
    pub fn base_url(&self) -> &Url {
        &self.config.base_url
    }

    /// Get the guard (policy decision) API.
    pub fn guard(&self) -> GuardApi<'_> {
        GuardApi::new(self)
    }

    /// Get the vault API.
    pub fn vault(&self) -> VaultApi<'_> {
        VaultApi::new(self)
    }
}

#[async_trait::async_trait]
impl PolicyEvaluator for GuardClient {
    async fn evaluate(&self, request: &GuardRequest) -> Result<Verdict, PolicyError> {
        self.guard().evaluate(request).await.map_err(PolicyError::from)
    }
}

/// Builder for creating a GuardClient.
pub struct GuardClientBuilder {
    base_url: Option<String>,
    token: Option<String>,
    timeout: Duration,
}

impl GuardClientBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            base_url: None,
            token: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the base URL of the service.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the bearer token.
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Authenticate with a resolved policy identity.
    pub fn identity(self, identity: &PolicyIdentity) -> Self {
        self.token(identity.token())
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the client.
    pub fn build(self) -> GuardClientResult<GuardClient> {
        let base_url_str = self
            .base_url
            .ok_or_else(|| GuardClientError::Config("base_url is required".to_string()))?;

        let base_url = Url::parse(&base_url_str)?;

        let config = ClientConfig {
            base_url,
            token: self.token,
            timeout: self.timeout,
        };

        GuardClient::from_config(config)
    }
}

impl Default for GuardClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

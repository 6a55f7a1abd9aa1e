// Where the decision-service credential comes from

use crate::config::{ConfigError, ProxyConfig};
use std::time::Duration;
use toolguard_sdk::{GuardClient, GuardClientResult, PolicyIdentity};

/// Credential settings as read from the command line or environment
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub policy_token: Option<String>,
    pub vault_token: Option<String>,
    pub vault_item_id: Option<String>,
}

#[derive(Debug, Clone)]
pub enum IdentitySource {
    /// Token given directly
    Token(PolicyIdentity),
    /// Secret stored in the vault under `item_id`
    Vault {
        base_url: String,
        token: String,
        item_id: String,
    },
}

impl IdentitySource {
    /// Pick the identity source. A direct token wins over the vault; `None`
    /// means nothing is configured.
    pub fn select(credentials: Credentials, config: &ProxyConfig) -> Result<Option<Self>, ConfigError> {
        if let Some(token) = credentials.policy_token.filter(|t| !t.is_empty()) {
            return Ok(Some(Self::Token(PolicyIdentity::new(token))));
        }

        match (credentials.vault_token, credentials.vault_item_id) {
            (None, None) => Ok(None),
            (Some(token), Some(item_id)) => {
                let base_url = config.vault.base_url.clone().ok_or_else(|| {
                    ConfigError::Invalid("vault.base_url is required for vault identity lookup".to_string())
                })?;
                Ok(Some(Self::Vault {
                    base_url,
                    token,
                    item_id,
                }))
            }
            _ => Err(ConfigError::Invalid(
                "TOOLGUARD_VAULT_TOKEN and TOOLGUARD_VAULT_ITEM_ID must be set together".to_string(),
            )),
        }
    }

    pub async fn resolve(self, timeout: Duration) -> GuardClientResult<PolicyIdentity> {
        match self {
            Self::Token(identity) => Ok(identity),
            Self::Vault {
                base_url,
                token,
                item_id,
            } => {
                let vault = GuardClient::builder()
                    .base_url(base_url)
                    .token(token)
                    .timeout(timeout)
                    .build()?;
                vault.vault().resolve_identity(&item_id).await
            }
        }
    }
}

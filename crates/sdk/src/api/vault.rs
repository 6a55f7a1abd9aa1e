//! Vault API: one-time credential lookup.

use crate::api::ServiceResponse;
use crate::client::GuardClient;
use crate::error::{GuardClientError, GuardClientResult};
use serde::{Deserialize, Serialize};
use toolguard_core::PolicyIdentity;
use tracing::info;

/// Path of the vault item lookup endpoint.
pub const VAULT_GET_PATH: &str = "/v2/get";

/// Vault API for resolving stored secrets.
pub struct VaultApi<'a> {
    client: &'a GuardClient,
}

impl<'a> VaultApi<'a> {
    pub(crate) fn new(client: &'a GuardClient) -> Self {
        Self { client }
    }

    /// Fetch a vault item.
    pub async fn get(&self, item_id: &str) -> GuardClientResult<VaultItem> {
        let request = GetItemRequest {
            id: item_id.to_string(),
        };
        let response: ServiceResponse<VaultItem> =
            self.client.http.post(VAULT_GET_PATH, &request).await?;
        response.into_result()
    }

    /// Get the secret held by the first item version that carries one.
    pub async fn get_secret(&self, item_id: &str) -> GuardClientResult<String> {
        let item = self.get(item_id).await?;
        item.item_versions
            .into_iter()
            .find_map(|version| version.secret)
            .ok_or_else(|| GuardClientError::MissingSecret(item_id.to_string()))
    }

    /// Resolve the decision-service credential stored under `item_id`.
    pub async fn resolve_identity(&self, item_id: &str) -> GuardClientResult<PolicyIdentity> {
        let secret = self.get_secret(item_id).await?;
        info!(item_id, "resolved policy identity from vault");
        Ok(PolicyIdentity::new(secret))
    }
}

/// Request body for an item lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetItemRequest {
    pub id: String,
}

/// A vault item and its versions, newest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultItem {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub item_versions: Vec<VaultItemVersion>,
}

/// One stored version of a vault item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultItemVersion {
    #[serde(default)]
    pub version: Option<u32>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub secret: Option<String>,
}

//! API endpoint groups.

pub mod guard;
pub mod vault;

pub use guard::GuardApi;
pub use vault::VaultApi;

use crate::error::{GuardClientError, GuardClientResult};
use serde::{Deserialize, Serialize};

/// Status string the services use for successful calls.
pub const STATUS_SUCCESS: &str = "Success";

/// Response envelope shared by the decision service and the vault.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ServiceResponse<T> {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,
}

impl<T> ServiceResponse<T> {
    /// Unwrap the result of a successful envelope.
    pub fn into_result(self) -> GuardClientResult<T> {
        if self.status != STATUS_SUCCESS {
            return Err(GuardClientError::Status {
                status: self.status,
                summary: self.summary.unwrap_or_default(),
            });
        }
        self.result.ok_or(GuardClientError::MissingResult)
    }
}

//! Error types for the Toolguard SDK.

use serde::{Deserialize, Serialize};
use toolguard_core::PolicyError;

/// Result type for SDK operations.
pub type GuardClientResult<T> = Result<T, GuardClientError>;

/// Error types that can occur when calling the decision service or vault.
#[derive(Debug, thiserror::Error)]
pub enum GuardClientError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Service returned a non-success HTTP status.
    #[error("API error (status {status}): {message}")]
    Api {
        status: u16,
        message: String,
        details: Option<String>,
    },

    /// Service answered 2xx but reported a non-success status in its envelope.
    #[error("service reported status {status}: {summary}")]
    Status { status: String, summary: String },

    /// Successful envelope without a result payload.
    #[error("response is missing its result")]
    MissingResult,

    /// Vault item has no version carrying a secret.
    #[error("vault item {0} has no secret")]
    MissingSecret(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Connection timeout.
    #[error("Request timed out")]
    Timeout,

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl GuardClientError {
    /// Create an API error from a status code and response body.
    pub fn from_response(status: u16, body: &str) -> Self {
        // Try to parse as the service error envelope
        if let Ok(error_response) = serde_json::from_str::<ErrorResponse>(body) {
            Self::Api {
                status,
                message: error_response
                    .summary
                    .unwrap_or_else(|| error_response.status.clone()),
                details: Some(error_response.status),
            }
        } else {
            Self::Api {
                status,
                message: body.to_string(),
                details: None,
            }
        }
    }
}

/// Error envelope returned by the decision service and the vault.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl From<GuardClientError> for PolicyError {
    fn from(err: GuardClientError) -> Self {
        match err {
            GuardClientError::Http(_) | GuardClientError::Timeout => {
                PolicyError::Unavailable(err.to_string())
            }
            GuardClientError::Api {
                status, message, ..
            } => PolicyError::Rejected { status, message },
            GuardClientError::Status { status, summary } => PolicyError::Rejected {
                status: 200,
                message: format!("{}: {}", status, summary),
            },
            other => PolicyError::Malformed(other.to_string()),
        }
    }
}

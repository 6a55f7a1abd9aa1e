// Error types for the MCP proxy

use crate::protocol::JsonRpcError;
use std::time::Duration;
use toolguard_core::PolicyError;

/// Which policy evaluation a failure belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardPhase {
    ToolList,
    Input,
    Output,
}

impl std::fmt::Display for GuardPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::ToolList => "tool list",
            Self::Input => "tool input",
            Self::Output => "tool output",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum McpError {
    #[error("failed to spawn downstream server `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("downstream handshake failed: {0}")]
    Handshake(String),

    #[error("downstream handshake timed out after {0:?}")]
    HandshakeTimeout(Duration),

    #[error("connection closed")]
    ConnectionClosed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error response from the remote peer, relayed unmodified
    #[error("remote error {}: {}", .0.code, .0.message)]
    Remote(JsonRpcError),

    #[error("failed to guard {phase}: {source}")]
    Policy {
        phase: GuardPhase,
        #[source]
        source: PolicyError,
    },

    #[error("invalid params: {0}")]
    InvalidParams(String),

    #[error("method not found: {0}")]
    MethodNotFound(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl McpError {
    pub fn policy(phase: GuardPhase, source: PolicyError) -> Self {
        Self::Policy { phase, source }
    }

    /// JSON-RPC error to send back to the caller of a failed request
    pub fn to_jsonrpc_error(&self) -> JsonRpcError {
        match self {
            Self::Remote(error) => error.clone(),
            Self::InvalidParams(message) => JsonRpcError::invalid_params(message.clone()),
            Self::MethodNotFound(method) => JsonRpcError::method_not_found(method),
            other => JsonRpcError::internal_error(other.to_string()),
        }
    }
}

pub type McpResult<T> = Result<T, McpError>;

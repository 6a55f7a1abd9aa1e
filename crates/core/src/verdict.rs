//! Policy verdicts returned by the decision service.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Diagnostic fields that echo the evaluated content back. They are stripped
/// before diagnostics are disclosed to the upstream caller.
pub const ECHOED_CONTENT_FIELDS: &[&str] = &[
    "messages",
    "prompt_messages",
    "prompt_text",
    "tools",
    "sanitized_content",
];

/// Outcome of one evaluation. Never cached or reused across calls.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    #[serde(default)]
    pub blocked: bool,
    #[serde(default)]
    pub transformed: bool,
    /// Replacement content, present when `transformed` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sanitized_content: Option<String>,
    /// Everything else the service reported (detectors, policy name, ...).
    #[serde(flatten)]
    pub diagnostics: Map<String, Value>,
}

impl Verdict {
    /// Non-blocking, non-transforming verdict.
    pub fn allow() -> Self {
        Self::default()
    }

    /// Blocking verdict carrying diagnostics.
    pub fn block(diagnostics: Map<String, Value>) -> Self {
        Self {
            blocked: true,
            diagnostics,
            ..Self::default()
        }
    }

    /// Transforming verdict with replacement content.
    pub fn transform(content: impl Into<String>) -> Self {
        Self {
            transformed: true,
            sanitized_content: Some(content.into()),
            ..Self::default()
        }
    }

    /// Replacement content to apply, if this verdict rewrites the payload.
    pub fn replacement(&self) -> Option<&str> {
        if self.transformed {
            self.sanitized_content.as_deref()
        } else {
            None
        }
    }

    /// Diagnostics with echoed content removed, safe to embed in a result.
    pub fn disclosable_diagnostics(&self) -> Map<String, Value> {
        self.diagnostics
            .iter()
            .filter(|(key, _)| !ECHOED_CONTENT_FIELDS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}

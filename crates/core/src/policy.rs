// Policy evaluation contract between the proxy and the content-safety decision service

use crate::verdict::Verdict;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Role of a synthetic conversation message submitted for evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A single role-tagged message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn tool(content: impl Into<String>) -> Self {
        Self::new(Role::Tool, content)
    }
}

/// What is being screened: conversation messages or a tool descriptor list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardPayload {
    Messages(Vec<Message>),
    Tools(Vec<Value>),
}

/// How the decision service picks the rules to apply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicySelector {
    /// Named server-side recipe
    Recipe(String),
    /// Inline rule overrides, bypassing recipe selection
    Overrides(Value),
}

/// Identity and context fields attached to every evaluation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GuardContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra_info: Map<String, Value>,
}

impl GuardContext {
    pub fn new(app_id: Option<String>) -> Self {
        Self {
            app_id,
            extra_info: Map::new(),
        }
    }

    /// Attach a free-form context field
    pub fn with_info(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra_info.insert(key.into(), value.into());
        self
    }
}

/// One evaluation request
#[derive(Debug, Clone, PartialEq)]
pub struct GuardRequest {
    pub payload: GuardPayload,
    pub selector: PolicySelector,
    pub context: GuardContext,
}

impl GuardRequest {
    /// Screen a single message under a named recipe
    pub fn message(message: Message, recipe: impl Into<String>, context: GuardContext) -> Self {
        Self {
            payload: GuardPayload::Messages(vec![message]),
            selector: PolicySelector::Recipe(recipe.into()),
            context,
        }
    }

    /// Screen a whole tool list as one unit under inline overrides
    pub fn tools(tools: Vec<Value>, overrides: Value, context: GuardContext) -> Self {
        Self {
            payload: GuardPayload::Tools(tools),
            selector: PolicySelector::Overrides(overrides),
            context,
        }
    }
}

/// Failure of the decision call itself, as opposed to a blocking verdict
#[derive(Debug, Clone, thiserror::Error)]
pub enum PolicyError {
    #[error("policy service unreachable: {0}")]
    Unavailable(String),

    #[error("policy service rejected the request (status {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("malformed policy verdict: {0}")]
    Malformed(String),
}

/// Policy evaluator trait
#[async_trait::async_trait]
pub trait PolicyEvaluator: Send + Sync {
    /// Evaluate a payload and return a fresh verdict
    async fn evaluate(&self, request: &GuardRequest) -> Result<Verdict, PolicyError>;
}

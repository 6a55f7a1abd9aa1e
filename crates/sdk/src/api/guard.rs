//! Guard API: policy decisions on messages and tool lists.

use crate::api::ServiceResponse;
use crate::client::GuardClient;
use crate::error::GuardClientResult;
use serde::Serialize;
use serde_json::Value;
use toolguard_core::{GuardContext, GuardPayload, GuardRequest, Message, PolicySelector, Verdict};
use tracing::debug;

/// Path of the decision endpoint.
pub const GUARD_PATH: &str = "/v1/guard";

/// Guard API for evaluating content against a policy.
pub struct GuardApi<'a> {
    client: &'a GuardClient,
}

impl<'a> GuardApi<'a> {
    pub(crate) fn new(client: &'a GuardClient) -> Self {
        Self { client }
    }

    /// Evaluate a payload and return the verdict.
    pub async fn evaluate(&self, request: &GuardRequest) -> GuardClientResult<Verdict> {
        let body = GuardRequestBody::from(request);
        let response: ServiceResponse<Verdict> = self.client.http.post(GUARD_PATH, &body).await?;
        let verdict = response.into_result()?;

        debug!(
            blocked = verdict.blocked,
            transformed = verdict.transformed,
            "policy verdict received"
        );
        Ok(verdict)
    }
}

/// Wire body of a guard call.
#[derive(Debug, Serialize)]
pub struct GuardRequestBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub messages: Option<&'a [Message]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<&'a [Value]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipe: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overrides: Option<&'a Value>,
    #[serde(flatten)]
    pub context: &'a GuardContext,
}

impl<'a> From<&'a GuardRequest> for GuardRequestBody<'a> {
    fn from(request: &'a GuardRequest) -> Self {
        let (messages, tools) = match &request.payload {
            GuardPayload::Messages(messages) => (Some(messages.as_slice()), None),
            GuardPayload::Tools(tools) => (None, Some(tools.as_slice())),
        };
        let (recipe, overrides) = match &request.selector {
            PolicySelector::Recipe(recipe) => (Some(recipe.as_str()), None),
            PolicySelector::Overrides(overrides) => (None, Some(overrides)),
        };

        Self {
            messages,
            tools,
            recipe,
            overrides,
            context: &request.context,
        }
    }
}

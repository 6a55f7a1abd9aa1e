//! Guarded tool gateway.
//!
//! `tools/list` results are screened as one unit before they reach the
//! caller. `tools/call` arguments are screened before they are forwarded and
//! the returned content is screened before it is handed back. A blocking
//! verdict turns into a synthetic `isError` result; a transforming verdict
//! rewrites the payload in place. Anything that is not rewritten crosses the
//! gateway byte for byte.

use crate::downstream::Downstream;
use crate::error::{GuardPhase, McpError, McpResult};
use crate::protocol::{
    from_raw, methods, to_raw, CallToolResult, ListToolsResult, RawJson, ToolContent,
};
use futures::{StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use toolguard_core::{GuardContext, GuardRequest, Message, PolicyError, PolicyEvaluator, Verdict};
use tracing::{debug, info};

pub const DEFAULT_INPUT_RECIPE: &str = "agent_pre_tool_guard";
pub const DEFAULT_OUTPUT_RECIPE: &str = "agent_post_tool_guard";

pub const INPUT_BLOCKED_MESSAGE: &str = "Input has been blocked by the content policy.";
pub const OUTPUT_BLOCKED_MESSAGE: &str = "Output has been blocked by the content policy.";

/// Rule overrides for screening tool lists: recipes are ignored and only the
/// malicious-prompt detector runs, blocking on detection.
pub fn default_list_overrides() -> Value {
    json!({
        "ignore_recipe": true,
        "malicious_prompt": {"disabled": false, "action": "block"}
    })
}

/// Policy selection for each guard phase
#[derive(Debug, Clone, PartialEq)]
pub struct GuardConfig {
    pub input_recipe: String,
    pub output_recipe: String,
    pub list_overrides: Value,
    /// Application identity reported with every evaluation
    pub app_id: Option<String>,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            input_recipe: DEFAULT_INPUT_RECIPE.to_string(),
            output_recipe: DEFAULT_OUTPUT_RECIPE.to_string(),
            list_overrides: default_list_overrides(),
            app_id: None,
        }
    }
}

/// The parts of `tools/call` params the gateway reads
#[derive(Deserialize)]
struct ToolCall {
    name: String,
    #[serde(default)]
    arguments: Option<RawJson>,
}

/// A tool result as screened. Content items and the structured payload stay
/// raw until a verdict rewrites them.
#[derive(Serialize, Deserialize)]
struct ToolOutput {
    #[serde(default)]
    content: Vec<RawJson>,
    #[serde(
        rename = "structuredContent",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    structured_content: Option<RawJson>,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

/// Why output screening stopped early
enum Interrupt {
    Blocked(Verdict),
    Failed(McpError),
}

impl From<McpError> for Interrupt {
    fn from(error: McpError) -> Self {
        Self::Failed(error)
    }
}

impl From<serde_json::Error> for Interrupt {
    fn from(error: serde_json::Error) -> Self {
        Self::Failed(error.into())
    }
}

fn malformed(phase: GuardPhase, what: &str, error: serde_json::Error) -> McpError {
    McpError::policy(
        phase,
        PolicyError::Malformed(format!("sanitized {} is not valid JSON: {}", what, error)),
    )
}

pub struct ToolGateway {
    downstream: Arc<dyn Downstream>,
    policy: Arc<dyn PolicyEvaluator>,
    config: GuardConfig,
}

impl ToolGateway {
    pub fn new(
        downstream: Arc<dyn Downstream>,
        policy: Arc<dyn PolicyEvaluator>,
        config: GuardConfig,
    ) -> Self {
        Self {
            downstream,
            policy,
            config,
        }
    }

    fn context(&self, tool_name: Option<&str>) -> GuardContext {
        let context = GuardContext::new(self.config.app_id.clone())
            .with_info("app_name", self.downstream.server().server_info.name.clone());
        match tool_name {
            Some(name) => context.with_info("tool_name", name),
            None => context,
        }
    }

    /// Fetch the downstream tool list and screen it. A blocked list comes
    /// back empty with every other result field intact.
    pub async fn list_tools(&self, params: Option<RawJson>) -> McpResult<RawJson> {
        let result = self.downstream.forward(methods::TOOLS_LIST, params).await?;
        let mut listing: ListToolsResult = from_raw(&result)?;

        if listing.tools.is_empty() {
            debug!("downstream listed no tools");
            return Ok(result);
        }

        let tools = listing
            .tools
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;
        let request = GuardRequest::tools(tools, self.config.list_overrides.clone(), self.context(None));

        let verdict = self
            .policy
            .evaluate(&request)
            .await
            .map_err(|e| McpError::policy(GuardPhase::ToolList, e))?;

        if !verdict.blocked {
            return Ok(result);
        }

        info!(tools = listing.tools.len(), "tool list blocked");
        listing.tools.clear();
        Ok(to_raw(&listing)?)
    }

    /// Screen the arguments, forward the call, then screen the result.
    pub async fn call_tool(&self, params: Option<RawJson>) -> McpResult<RawJson> {
        let params =
            params.ok_or_else(|| McpError::InvalidParams("missing tools/call params".to_string()))?;
        let call: ToolCall = from_raw(&params).map_err(|e| McpError::InvalidParams(e.to_string()))?;
        let context = self.context(Some(&call.name));

        let arguments = call.arguments.as_ref().map_or("{}", |arguments| arguments.get());
        let request = GuardRequest::message(
            Message::user(arguments),
            self.config.input_recipe.clone(),
            context.clone(),
        );
        let verdict = self
            .policy
            .evaluate(&request)
            .await
            .map_err(|e| McpError::policy(GuardPhase::Input, e))?;

        if verdict.blocked {
            info!(tool = %call.name, "tool input blocked");
            return Ok(to_raw(&blocked_result(INPUT_BLOCKED_MESSAGE, &verdict))?);
        }

        let params = match verdict.replacement() {
            Some(replacement) => {
                let sanitized = RawValue::from_string(replacement.to_string())
                    .map_err(|e| malformed(GuardPhase::Input, "arguments", e))?;
                debug!(tool = %call.name, "tool input transformed");
                let mut fields: BTreeMap<String, RawJson> =
                    from_raw(&params).map_err(|e| McpError::InvalidParams(e.to_string()))?;
                fields.insert("arguments".to_string(), sanitized);
                to_raw(&fields)?
            }
            None => params,
        };

        let result = self.downstream.forward(methods::TOOLS_CALL, Some(params)).await?;

        match self.guard_output(&result, &context).await {
            Ok(None) => Ok(result),
            Ok(Some(rewritten)) => Ok(to_raw(&rewritten)?),
            Err(Interrupt::Blocked(verdict)) => {
                info!(tool = %call.name, "tool output blocked");
                Ok(to_raw(&blocked_result(OUTPUT_BLOCKED_MESSAGE, &verdict))?)
            }
            Err(Interrupt::Failed(error)) => Err(error),
        }
    }

    /// Screen a tool result. `structuredContent` is always screened as one
    /// message; text items that mirror it follow its verdict, otherwise each
    /// text item is screened in order. `None` means nothing was rewritten.
    async fn guard_output(
        &self,
        result: &RawValue,
        context: &GuardContext,
    ) -> Result<Option<ToolOutput>, Interrupt> {
        let mut output: ToolOutput = from_raw(result)?;
        let mirrored = match &output.structured_content {
            Some(structured) => mirrors(structured, &output.content)?,
            None => false,
        };
        let mut rewritten = false;

        if let Some(structured) = output.structured_content.take() {
            let verdict = self.screen(structured.get().to_string(), context).await?;
            output.structured_content = match verdict.replacement() {
                Some(replacement) => {
                    let sanitized = RawValue::from_string(replacement.to_string())
                        .map_err(|e| malformed(GuardPhase::Output, "structured content", e))?;
                    if mirrored {
                        output.content = rewrite_mirrors(output.content, sanitized.get())?;
                    }
                    rewritten = true;
                    Some(sanitized)
                }
                None => Some(structured),
            };
        }

        if !mirrored {
            let (content, changed) = self.guard_text(output.content, context).await?;
            output.content = content;
            rewritten |= changed;
        }

        Ok(rewritten.then_some(output))
    }

    /// Screen text items in order, stopping at the first block. Items that
    /// are not rewritten are kept as received.
    async fn guard_text(
        &self,
        content: Vec<RawJson>,
        context: &GuardContext,
    ) -> Result<(Vec<RawJson>, bool), Interrupt> {
        let capacity = content.len();
        futures::stream::iter(content)
            .map(Ok::<_, Interrupt>)
            .try_fold(
                (Vec::with_capacity(capacity), false),
                |(mut guarded, mut changed), item| async move {
                    let item = match from_raw::<ToolContent>(&item)? {
                        ToolContent::Text(mut text) => {
                            let verdict = self.screen(text.text.clone(), context).await?;
                            match verdict.replacement() {
                                Some(replacement) => {
                                    text.text = replacement.to_string();
                                    changed = true;
                                    to_raw(&text)?
                                }
                                None => item,
                            }
                        }
                        ToolContent::Other(_) => item,
                    };
                    guarded.push(item);
                    Ok((guarded, changed))
                },
            )
            .await
    }

    async fn screen(&self, content: String, context: &GuardContext) -> Result<Verdict, Interrupt> {
        let request = GuardRequest::message(
            Message::tool(content),
            self.config.output_recipe.clone(),
            context.clone(),
        );
        let verdict = self
            .policy
            .evaluate(&request)
            .await
            .map_err(|e| McpError::policy(GuardPhase::Output, e))?;

        if verdict.blocked {
            return Err(Interrupt::Blocked(verdict));
        }
        Ok(verdict)
    }
}

/// True when there is at least one text item and every text item is the
/// serialized form of `structured`.
fn mirrors(structured: &RawValue, content: &[RawJson]) -> serde_json::Result<bool> {
    let structured: Value = from_raw(structured)?;
    let mut texts = 0;
    for item in content {
        if let ToolContent::Text(text) = from_raw::<ToolContent>(item)? {
            texts += 1;
            if serde_json::from_str::<Value>(&text.text).ok().as_ref() != Some(&structured) {
                return Ok(false);
            }
        }
    }
    Ok(texts > 0)
}

/// Replace every text item with the sanitized structured payload.
fn rewrite_mirrors(content: Vec<RawJson>, mirror: &str) -> serde_json::Result<Vec<RawJson>> {
    content
        .into_iter()
        .map(|item| match from_raw::<ToolContent>(&item)? {
            ToolContent::Text(mut text) => {
                text.text = mirror.to_string();
                to_raw(&text)
            }
            ToolContent::Other(_) => Ok(item),
        })
        .collect()
}

/// Synthetic result replacing blocked content.
fn blocked_result(message: &str, verdict: &Verdict) -> CallToolResult {
    let body = json!({
        "blocked": true,
        "message": message,
        "policy": Value::Object(verdict.disclosable_diagnostics()),
    });
    CallToolResult {
        content: vec![ToolContent::text(body.to_string())],
        structured_content: None,
        is_error: Some(true),
        extra: Map::new(),
    }
}

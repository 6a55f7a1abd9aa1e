// Echo tool, handy for exercising guard verdicts end to end

use crate::protocol::{CallToolResult, ToolContent, ToolSchema};
use crate::tools::{json_schema_boolean, json_schema_object, json_schema_string, tool_schema, Tool};
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{json, Map, Value};

pub struct EchoTool;

#[derive(Debug, Deserialize)]
struct EchoArgs {
    message: String,
    #[serde(default)]
    structured: bool,
}

#[async_trait::async_trait]
impl Tool for EchoTool {
    fn schema(&self) -> ToolSchema {
        tool_schema(
            "echo",
            "Return the given message unchanged",
            json_schema_object(
                json!({
                    "message": json_schema_string("Text to echo back"),
                    "structured": json_schema_boolean("Also return the message as structured content (default: false)")
                }),
                vec!["message"],
            ),
        )
    }

    async fn execute(&self, arguments: Value) -> Result<CallToolResult> {
        let args: EchoArgs = serde_json::from_value(arguments).context("Invalid arguments for echo")?;

        if !args.structured {
            return Ok(CallToolResult::text(args.message));
        }

        let structured = json!({"message": args.message});
        Ok(CallToolResult {
            content: vec![ToolContent::text(structured.to_string())],
            structured_content: Some(structured),
            is_error: None,
            extra: Map::new(),
        })
    }
}

// Pass-through forwarding for the non-tool categories

use crate::downstream::Downstream;
use crate::error::McpResult;
use crate::protocol::RawJson;
use std::sync::Arc;
use tracing::debug;

/// Forwards requests to the downstream method of the same name. Params and
/// results are never parsed; downstream errors come back unchanged.
#[derive(Clone)]
pub struct Relay {
    downstream: Arc<dyn Downstream>,
}

impl Relay {
    pub fn new(downstream: Arc<dyn Downstream>) -> Self {
        Self { downstream }
    }

    pub async fn forward_request(&self, method: &str, params: Option<RawJson>) -> McpResult<RawJson> {
        debug!(method, "relaying request");
        self.downstream.forward(method, params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::McpError;
    use crate::protocol::{methods, InitializeResult, JsonRpcError, ServerCapabilities, ServerInfo};
    use serde_json::value::RawValue;
    use std::sync::Mutex;

    struct Recorder {
        server: InitializeResult,
        calls: Mutex<Vec<(String, Option<String>)>>,
        reply: Result<&'static str, JsonRpcError>,
    }

    #[async_trait::async_trait]
    impl Downstream for Recorder {
        fn server(&self) -> &InitializeResult {
            &self.server
        }

        async fn forward(&self, method: &str, params: Option<RawJson>) -> McpResult<RawJson> {
            self.calls
                .lock()
                .unwrap()
                .push((method.to_string(), params.map(|p| p.get().to_string())));
            match &self.reply {
                Ok(reply) => Ok(RawValue::from_string(reply.to_string())?),
                Err(error) => Err(McpError::Remote(error.clone())),
            }
        }

        async fn notify(&self, method: &str, params: Option<RawJson>) -> McpResult<()> {
            self.calls
                .lock()
                .unwrap()
                .push((method.to_string(), params.map(|p| p.get().to_string())));
            Ok(())
        }
    }

    fn recorder(reply: Result<&'static str, JsonRpcError>) -> Arc<Recorder> {
        Arc::new(Recorder {
            server: InitializeResult {
                protocol_version: "2025-06-18".to_string(),
                capabilities: ServerCapabilities::default(),
                server_info: ServerInfo {
                    name: "files".to_string(),
                    version: "0.1.0".to_string(),
                },
                instructions: None,
            },
            calls: Mutex::new(Vec::new()),
            reply,
        })
    }

    #[tokio::test]
    async fn test_params_and_result_are_unmodified() {
        let reply = r#"{"contents":[{"uri":"file:///a","text":"hello","_meta":{"z":1,"a":18446744073709551616}}]}"#;
        let downstream = recorder(Ok(reply));
        let relay = Relay::new(downstream.clone());

        let params = r#"{"uri": "file:///a", "_meta": {"progressToken": 7}}"#;
        let result = relay
            .forward_request(
                methods::RESOURCES_READ,
                Some(RawValue::from_string(params.to_string()).unwrap()),
            )
            .await
            .unwrap();

        assert_eq!(result.get(), reply);
        assert_eq!(
            *downstream.calls.lock().unwrap(),
            vec![(methods::RESOURCES_READ.to_string(), Some(params.to_string()))]
        );
    }

    #[tokio::test]
    async fn test_remote_error_propagates() {
        let error = JsonRpcError {
            code: -32002,
            message: "Resource not found".to_string(),
            data: Some(RawValue::from_string(r#"{"uri":"file:///missing"}"#.to_string()).unwrap()),
        };
        let relay = Relay::new(recorder(Err(error.clone())));

        let err = relay
            .forward_request(methods::RESOURCES_READ, None)
            .await
            .unwrap_err();
        assert_eq!(err.to_jsonrpc_error(), error);
    }
}

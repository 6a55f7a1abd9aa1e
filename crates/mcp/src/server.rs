// Minimal MCP server exposing a tool registry over any transport

use crate::error::McpResult;
use crate::peer::{Inbound, IncomingRequest, Peer};
use crate::protocol::{
    from_raw, methods, to_raw, CallToolParams, CallToolResult, InitializeParams, InitializeResult,
    JsonRpcError, ListToolsResult, RawJson, ServerCapabilities, ServerInfo, ToolsCapability,
    LATEST_PROTOCOL_VERSION,
};
use crate::tools::ToolRegistry;
use serde::Serialize;
use serde_json::{json, Map};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

pub struct McpServer {
    registry: Arc<ToolRegistry>,
    info: ServerInfo,
}

impl McpServer {
    pub fn new(registry: ToolRegistry, info: ServerInfo) -> Self {
        Self {
            registry: Arc::new(registry),
            info,
        }
    }

    /// Serve requests until the client disconnects. Requests run
    /// concurrently; responses may arrive out of order.
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> McpResult<()>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (peer, mut inbound) = Peer::spawn("client", reader, writer);
        let peer = Arc::new(peer);
        info!(server = %self.info.name, tools = self.registry.len(), "MCP server started");

        while let Some(message) = inbound.recv().await {
            match message {
                Inbound::Request(request) => {
                    let peer = peer.clone();
                    let registry = self.registry.clone();
                    let initialize = self.initialize_result();
                    tokio::spawn(async move {
                        let id = request.id.clone();
                        let reply = handle(&registry, initialize, request).await;
                        if let Err(e) = peer.respond(id, reply).await {
                            debug!(error = %e, "failed to send response");
                        }
                    });
                }
                Inbound::Notification(notification) => {
                    debug!(method = %notification.method, "notification received");
                }
            }
        }

        info!("client disconnected");
        peer.close();
        Ok(())
    }

    fn initialize_result(&self) -> InitializeResult {
        InitializeResult {
            protocol_version: LATEST_PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability::default()),
                ..Default::default()
            },
            server_info: self.info.clone(),
            instructions: None,
        }
    }
}

async fn handle(
    registry: &ToolRegistry,
    initialize: InitializeResult,
    request: IncomingRequest,
) -> Result<RawJson, JsonRpcError> {

    match request.method.as_str() {
        methods::INITIALIZE => {
            let mut result = initialize;
            if let Some(params) = request.params {
                let params: InitializeParams = from_raw(&params)
                    .map_err(|e| JsonRpcError::invalid_params(e.to_string()))?;
                info!(client = %params.client_info.name, version = %params.protocol_version, "client initializing");
                result.protocol_version = params.protocol_version;
            }
            reply(&result)
        }
        methods::PING => reply(&json!({})),
        methods::TOOLS_LIST => reply(&ListToolsResult {
            tools: registry.list_schemas(),
            extra: Map::new(),
        }),
        methods::TOOLS_CALL => {
            let params: CallToolParams = request
                .params
                .ok_or_else(|| JsonRpcError::invalid_params("missing tools/call params"))
                .and_then(|p| {
                    from_raw(&p).map_err(|e| JsonRpcError::invalid_params(e.to_string()))
                })?;

            let tool = registry
                .get(&params.name)
                .ok_or_else(|| JsonRpcError::invalid_params(format!("Unknown tool: {}", params.name)))?;

            let arguments = params.arguments.unwrap_or_else(|| json!({}));
            let result = match tool.execute(arguments).await {
                Ok(result) => result,
                Err(e) => {
                    warn!(tool = %params.name, error = %e, "tool execution failed");
                    CallToolResult::error(format!("{:#}", e))
                }
            };
            reply(&result)
        }
        other => Err(JsonRpcError::method_not_found(other)),
    }
}

fn reply<T: Serialize>(result: &T) -> Result<RawJson, JsonRpcError> {
    to_raw(result).map_err(|e| JsonRpcError::internal_error(e.to_string()))
}

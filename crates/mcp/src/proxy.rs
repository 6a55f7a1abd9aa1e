//! Upstream-facing proxy session.
//!
//! Serves the MCP server side to the upstream client: answers the lifecycle
//! methods itself, routes everything else through the negotiated
//! [`HandlerSet`], and relays downstream notifications in registered
//! categories. Each routed request runs in its own task so slow tool calls
//! never hold up other traffic.

use crate::capabilities::{negotiate, HandlerCategory, HandlerSet, Route};
use crate::downstream::{Downstream, NotificationStream};
use crate::error::{McpError, McpResult};
use crate::gateway::ToolGateway;
use crate::peer::{Inbound, IncomingNotification, IncomingRequest, Peer};
use crate::protocol::{from_raw, methods, to_raw, InitializeResult, JsonRpcError, RawJson, RequestId};
use crate::relay::Relay;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::task::{AbortHandle, JoinSet};
use tracing::{debug, info, warn};

pub struct Proxy {
    downstream: Arc<dyn Downstream>,
    handlers: HandlerSet,
    relay: Relay,
    gateway: Option<ToolGateway>,
}

impl Proxy {
    /// Negotiate handlers for the connected downstream. A server that
    /// advertises tools requires a gateway.
    pub fn new(downstream: Arc<dyn Downstream>, gateway: Option<ToolGateway>) -> McpResult<Self> {
        let handlers = negotiate(downstream.capabilities());

        if handlers.contains(HandlerCategory::Tools) && gateway.is_none() {
            return Err(McpError::Config(
                "downstream server advertises tools but no policy gateway is configured".to_string(),
            ));
        }

        info!(
            categories = ?handlers.categories().collect::<Vec<_>>(),
            "registered upstream handlers"
        );

        Ok(Self {
            relay: Relay::new(downstream.clone()),
            downstream,
            handlers,
            gateway,
        })
    }

    pub fn handlers(&self) -> &HandlerSet {
        &self.handlers
    }

    /// Result returned to the upstream `initialize`, mirroring the
    /// downstream server.
    pub fn initialize_result(&self) -> InitializeResult {
        self.downstream.server().clone()
    }

    /// Serve one upstream connection until it closes, `shutdown` resolves,
    /// or the downstream goes away. In-flight requests are aborted on exit.
    pub async fn serve<R, W, S>(
        self: Arc<Self>,
        reader: R,
        writer: W,
        mut notifications: NotificationStream,
        shutdown: S,
    ) -> McpResult<()>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
        S: Future<Output = ()>,
    {
        let (upstream, mut inbound) = Peer::spawn("upstream", reader, writer);
        let upstream = Arc::new(upstream);
        let mut session = Session {
            proxy: self.clone(),
            upstream: upstream.clone(),
            tasks: JoinSet::new(),
            in_flight: HashMap::new(),
        };
        tokio::pin!(shutdown);

        let outcome = loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("shutdown requested");
                    break Ok(());
                }
                message = inbound.recv() => match message {
                    Some(Inbound::Request(request)) => {
                        if session.handle_request(request).await.is_err() {
                            break Ok(());
                        }
                    }
                    Some(Inbound::Notification(notification)) => session.handle_notification(notification),
                    None => {
                        info!("upstream connection closed");
                        break Ok(());
                    }
                },
                notification = notifications.recv() => match notification {
                    Some(notification) => {
                        if self.relay_notification(&upstream, notification).await.is_err() {
                            break Ok(());
                        }
                    }
                    None => {
                        warn!("downstream connection closed");
                        break Err(McpError::ConnectionClosed);
                    }
                },
                Some(_) = session.tasks.join_next(), if !session.tasks.is_empty() => {
                    session.in_flight.retain(|_, task| !task.is_finished());
                }
            }
        };

        if !session.tasks.is_empty() {
            debug!(in_flight = session.tasks.len(), "aborting in-flight requests");
        }
        session.tasks.shutdown().await;
        upstream.close();
        outcome
    }

    async fn relay_notification(&self, upstream: &Peer, notification: IncomingNotification) -> McpResult<()> {
        if self.handlers.relays_notification(&notification.method) {
            upstream.notify(&notification.method, notification.params).await
        } else {
            debug!(method = %notification.method, "dropping downstream notification");
            Ok(())
        }
    }

    async fn route(&self, route: Route, method: &str, params: Option<RawJson>) -> McpResult<RawJson> {
        match route {
            Route::Relay => self.relay.forward_request(method, params).await,
            Route::ListTools => self.gateway(method)?.list_tools(params).await,
            Route::CallTool => self.gateway(method)?.call_tool(params).await,
        }
    }

    fn gateway(&self, method: &str) -> McpResult<&ToolGateway> {
        self.gateway
            .as_ref()
            .ok_or_else(|| McpError::MethodNotFound(method.to_string()))
    }
}

#[derive(Deserialize)]
struct CancelledParams {
    #[serde(rename = "requestId")]
    request_id: RequestId,
}

/// Per-connection bookkeeping for spawned requests
struct Session {
    proxy: Arc<Proxy>,
    upstream: Arc<Peer>,
    tasks: JoinSet<()>,
    in_flight: HashMap<RequestId, AbortHandle>,
}

impl Session {
    async fn handle_request(&mut self, request: IncomingRequest) -> McpResult<()> {
        let IncomingRequest { id, method, params } = request;

        if let Some(route) = self.proxy.handlers.route(&method) {
            self.spawn(id, method, params, route);
            return Ok(());
        }

        let reply = match method.as_str() {
            methods::INITIALIZE => {
                info!(downstream = %self.proxy.downstream.server().server_info.name, "upstream client initializing");
                to_raw(&self.proxy.initialize_result())
                    .map_err(|e| JsonRpcError::internal_error(e.to_string()))
            }
            methods::PING => to_raw(&json!({})).map_err(|e| JsonRpcError::internal_error(e.to_string())),
            other => {
                debug!(method = other, "no handler registered");
                Err(JsonRpcError::method_not_found(other))
            }
        };

        self.upstream.respond(id, reply).await
    }

    fn spawn(&mut self, id: RequestId, method: String, params: Option<RawJson>, route: Route) {
        let proxy = self.proxy.clone();
        let upstream = self.upstream.clone();
        let request_id = id.clone();

        let task = self.tasks.spawn(async move {
            let reply = proxy.route(route, &method, params).await.map_err(|e| {
                warn!(%id, method = %method, error = %e, "request failed");
                e.to_jsonrpc_error()
            });
            if let Err(e) = upstream.respond(id, reply).await {
                debug!(error = %e, "failed to send response");
            }
        });

        self.in_flight.insert(request_id, task);
    }

    fn handle_notification(&mut self, notification: IncomingNotification) {
        match notification.method.as_str() {
            methods::INITIALIZED => debug!("upstream client initialized"),
            methods::CANCELLED => {
                let request_id = notification
                    .params
                    .as_deref()
                    .and_then(|params| from_raw::<CancelledParams>(params).ok())
                    .map(|params| params.request_id);
                match request_id.and_then(|id| self.in_flight.remove(&id).map(|task| (id, task))) {
                    Some((id, task)) => {
                        info!(%id, "request cancelled by client");
                        task.abort();
                    }
                    None => debug!("cancellation for unknown or finished request"),
                }
            }
            other => debug!(method = other, "ignoring upstream notification"),
        }
    }
}

//! Connection to the wrapped (downstream) MCP server.
//!
//! [`DownstreamClient`] performs the `initialize` handshake over any
//! transport; [`StdioDownstream`] spawns the server as a child process and
//! speaks to it over its stdin/stdout. Both expose the [`Downstream`] trait
//! used by the relay layer and the tool gateway.

use crate::error::{McpError, McpResult};
use crate::peer::{Inbound, IncomingNotification, Peer};
use crate::protocol::{
    from_raw, methods, to_raw, ClientCapabilities, ClientInfo, InitializeParams, InitializeResult,
    JsonRpcError, RawJson, ServerCapabilities, LATEST_PROTOCOL_VERSION,
};
use serde_json::json;
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

pub const CLIENT_NAME: &str = "toolguard-proxy-client";
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

const NOTIFICATION_QUEUE: usize = 256;

/// Operations the proxy needs from the wrapped server
#[async_trait::async_trait]
pub trait Downstream: Send + Sync {
    /// Result of the `initialize` handshake
    fn server(&self) -> &InitializeResult;

    fn capabilities(&self) -> &ServerCapabilities {
        &self.server().capabilities
    }

    /// Send a request and return its result unmodified
    async fn forward(&self, method: &str, params: Option<RawJson>) -> McpResult<RawJson>;

    async fn notify(&self, method: &str, params: Option<RawJson>) -> McpResult<()>;
}

/// Notifications emitted by the downstream server, in arrival order. Closes
/// when the downstream connection does.
pub type NotificationStream = mpsc::Receiver<IncomingNotification>;

/// MCP client side of a downstream connection over an arbitrary transport
pub struct DownstreamClient {
    peer: Arc<Peer>,
    server: InitializeResult,
}

impl DownstreamClient {
    /// Run the `initialize` handshake. Fails if the server errors, answers
    /// with something that is not an initialize result, or does not answer
    /// within `timeout`.
    pub async fn connect<R, W>(
        reader: R,
        writer: W,
        timeout: Duration,
    ) -> McpResult<(Self, NotificationStream)>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (peer, inbound) = Peer::spawn("downstream", reader, writer);
        let peer = Arc::new(peer);
        let (notifications_tx, notifications) = mpsc::channel(NOTIFICATION_QUEUE);

        tokio::spawn(serve_server_traffic(peer.clone(), inbound, notifications_tx));

        let params = InitializeParams {
            protocol_version: LATEST_PROTOCOL_VERSION.to_string(),
            capabilities: ClientCapabilities::default(),
            client_info: ClientInfo {
                name: CLIENT_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        };

        let handshake = async {
            let result = peer
                .request(methods::INITIALIZE, Some(to_raw(&params)?))
                .await
                .map_err(|e| McpError::Handshake(e.to_string()))?;
            let server: InitializeResult = from_raw(&result)
                .map_err(|e| McpError::Handshake(format!("invalid initialize result: {}", e)))?;
            peer.notify(methods::INITIALIZED, None).await?;
            Ok::<_, McpError>(server)
        };

        let server = match tokio::time::timeout(timeout, handshake).await {
            Ok(Ok(server)) => server,
            Ok(Err(e)) => {
                peer.close();
                return Err(e);
            }
            Err(_) => {
                peer.close();
                return Err(McpError::HandshakeTimeout(timeout));
            }
        };

        info!(
            server = %server.server_info.name,
            version = %server.server_info.version,
            protocol = %server.protocol_version,
            "connected to downstream server"
        );

        Ok((Self { peer, server }, notifications))
    }

    pub fn close(&self) {
        self.peer.close();
    }
}

#[async_trait::async_trait]
impl Downstream for DownstreamClient {
    fn server(&self) -> &InitializeResult {
        &self.server
    }

    async fn forward(&self, method: &str, params: Option<RawJson>) -> McpResult<RawJson> {
        self.peer.request(method, params).await
    }

    async fn notify(&self, method: &str, params: Option<RawJson>) -> McpResult<()> {
        self.peer.notify(method, params).await
    }
}

/// Answer server-initiated requests and pass notifications on. This client
/// advertises no capabilities, so only `ping` is served.
async fn serve_server_traffic(
    peer: Arc<Peer>,
    mut inbound: mpsc::Receiver<Inbound>,
    notifications: mpsc::Sender<IncomingNotification>,
) {
    while let Some(message) = inbound.recv().await {
        match message {
            Inbound::Request(request) => {
                let reply = if request.method == methods::PING {
                    to_raw(&json!({})).map_err(|e| JsonRpcError::internal_error(e.to_string()))
                } else {
                    debug!(method = %request.method, "rejecting server-initiated request");
                    Err(JsonRpcError::method_not_found(&request.method))
                };
                if peer.respond(request.id, reply).await.is_err() {
                    break;
                }
            }
            Inbound::Notification(notification) => {
                if notifications.send(notification).await.is_err() {
                    debug!("notification consumer gone");
                }
            }
        }
    }
    debug!("downstream connection closed");
}

/// How to launch the wrapped server
#[derive(Debug, Clone, Default)]
pub struct SpawnSpec {
    pub command: String,
    pub args: Vec<String>,
    /// Variables set in addition to the inherited environment
    pub env: HashMap<String, String>,
    /// Inherited variables removed from the child's environment
    pub env_remove: Vec<String>,
}

impl SpawnSpec {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            ..Default::default()
        }
    }
}

/// Downstream server running as a child process
pub struct StdioDownstream {
    client: DownstreamClient,
    child: Mutex<Option<Child>>,
}

impl StdioDownstream {
    /// Spawn the server and complete the handshake. Any failure is final.
    pub async fn spawn(
        spec: &SpawnSpec,
        handshake_timeout: Duration,
    ) -> McpResult<(Self, NotificationStream)> {
        let mut cmd = Command::new(&spec.command);
        cmd.args(&spec.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for key in &spec.env_remove {
            cmd.env_remove(key);
        }
        cmd.envs(&spec.env);

        let mut child = cmd.spawn().map_err(|source| McpError::Spawn {
            command: spec.command.clone(),
            source,
        })?;
        info!(command = %spec.command, args = ?spec.args, pid = ?child.id(), "spawned downstream server");

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| McpError::Handshake("failed to capture server stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| McpError::Handshake("failed to capture server stdout".to_string()))?;
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(pipe_stderr(stderr));
        }

        let (client, notifications) = DownstreamClient::connect(stdout, stdin, handshake_timeout).await?;

        Ok((
            Self {
                client,
                child: Mutex::new(Some(child)),
            },
            notifications,
        ))
    }

    /// Close the transport and terminate the child.
    pub async fn close(&self) {
        self.client.close();
        if let Some(mut child) = self.child.lock().await.take() {
            if let Err(e) = child.kill().await {
                warn!(error = %e, "failed to terminate downstream server");
            }
        }
    }
}

#[async_trait::async_trait]
impl Downstream for StdioDownstream {
    fn server(&self) -> &InitializeResult {
        self.client.server()
    }

    async fn forward(&self, method: &str, params: Option<RawJson>) -> McpResult<RawJson> {
        self.client.forward(method, params).await
    }

    async fn notify(&self, method: &str, params: Option<RawJson>) -> McpResult<()> {
        self.client.notify(method, params).await
    }
}

/// Re-emit the child's stderr on the proxy's log stream.
async fn pipe_stderr<R: AsyncRead + Unpin>(stderr: R) {
    let mut lines = BufReader::new(stderr).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => info!(target: "toolguard::downstream", "{}", line),
            Ok(None) => break,
            Err(e) => {
                warn!(target: "toolguard::downstream", error = %e, "failed to read server stderr");
                break;
            }
        }
    }
}

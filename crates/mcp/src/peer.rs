//! Newline-delimited JSON-RPC 2.0 peer.
//!
//! A [`Peer`] owns one writer task fed by a bounded queue, so whole messages
//! are written one at a time in submission order, and one reader task that
//! routes responses to waiting requests by id and hands inbound requests and
//! notifications to the owner through an mpsc channel. Requests may be
//! pipelined freely; correlation is by id only.

use crate::error::{McpError, McpResult};
use crate::protocol::{
    methods, to_raw, JsonRpcError, JsonRpcMessage, JsonRpcRequest, JsonRpcResponse, RawJson,
    RequestId, JSONRPC_VERSION,
};
use futures::{SinkExt, StreamExt};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec, LinesCodecError};
use tracing::{debug, trace, warn};

/// Lines longer than this are discarded before JSON parsing.
pub const MAX_MESSAGE_BYTES: usize = 10 * 1024 * 1024;

const OUTGOING_QUEUE: usize = 256;
const INBOUND_QUEUE: usize = 256;

/// Request received from the remote side; must be answered with
/// [`Peer::respond`].
#[derive(Debug, Clone)]
pub struct IncomingRequest {
    pub id: RequestId,
    pub method: String,
    pub params: Option<RawJson>,
}

#[derive(Debug, Clone)]
pub struct IncomingNotification {
    pub method: String,
    pub params: Option<RawJson>,
}

#[derive(Debug)]
pub enum Inbound {
    Request(IncomingRequest),
    Notification(IncomingNotification),
}

type Reply = Result<RawJson, JsonRpcError>;
type PendingMap = Mutex<HashMap<RequestId, oneshot::Sender<Reply>>>;

fn lock(pending: &PendingMap) -> MutexGuard<'_, HashMap<RequestId, oneshot::Sender<Reply>>> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct Peer {
    label: &'static str,
    outgoing: mpsc::Sender<JsonRpcMessage>,
    pending: Arc<PendingMap>,
    next_id: AtomicI64,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl Peer {
    /// Start the reader and writer tasks over a transport. The receiver yields
    /// inbound requests and notifications and closes when the transport does.
    pub fn spawn<R, W>(label: &'static str, reader: R, writer: W) -> (Self, mpsc::Receiver<Inbound>)
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (outgoing, outgoing_rx) = mpsc::channel(OUTGOING_QUEUE);
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_QUEUE);
        let pending = Arc::new(Mutex::new(HashMap::new()));

        let writer = tokio::spawn(write_loop(label, writer, outgoing_rx, pending.clone()));
        let reader = tokio::spawn(read_loop(label, reader, pending.clone(), inbound_tx));

        let peer = Self {
            label,
            outgoing,
            pending,
            next_id: AtomicI64::new(1),
            reader,
            writer,
        };
        (peer, inbound_rx)
    }

    /// Send a request and wait for its response.
    ///
    /// If the returned future is dropped before the response arrives, the
    /// pending entry is removed and a `notifications/cancelled` is queued for
    /// the remote side.
    pub async fn request(&self, method: &str, params: Option<RawJson>) -> McpResult<RawJson> {
        let id = RequestId::Number(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = oneshot::channel();
        lock(&self.pending).insert(id.clone(), tx);

        let mut guard = PendingGuard {
            peer: self,
            id: Some(id.clone()),
        };

        trace!(peer = self.label, %id, method, "sending request");
        let request = JsonRpcRequest::new(id.clone(), method, params);
        if let Err(e) = self.send(JsonRpcMessage::Request(request)).await {
            // Never written, so there is nothing to cancel remotely.
            guard.id = None;
            lock(&self.pending).remove(&id);
            return Err(e);
        }

        let reply = rx.await;
        guard.id = None;

        match reply {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(error)) => Err(McpError::Remote(error)),
            Err(_) => Err(McpError::ConnectionClosed),
        }
    }

    pub async fn notify(&self, method: &str, params: Option<RawJson>) -> McpResult<()> {
        trace!(peer = self.label, method, "sending notification");
        self.send(JsonRpcMessage::Request(JsonRpcRequest::notification(
            method, params,
        )))
        .await
    }

    /// Answer an inbound request.
    pub async fn respond(&self, id: RequestId, reply: Reply) -> McpResult<()> {
        let response = match reply {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(error) => JsonRpcResponse::error(Some(id), error),
        };
        self.send(JsonRpcMessage::Response(response)).await
    }

    /// Stop both tasks. Pending requests fail with `ConnectionClosed`.
    pub fn close(&self) {
        self.reader.abort();
        self.writer.abort();
        lock(&self.pending).clear();
    }

    async fn send(&self, message: JsonRpcMessage) -> McpResult<()> {
        self.outgoing
            .send(message)
            .await
            .map_err(|_| McpError::ConnectionClosed)
    }
}

/// Removes an unanswered request from the pending map when the waiting
/// future is dropped.
struct PendingGuard<'a> {
    peer: &'a Peer,
    id: Option<RequestId>,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        let Some(id) = self.id.take() else {
            return;
        };
        if lock(&self.peer.pending).remove(&id).is_some() {
            debug!(peer = self.peer.label, %id, "request abandoned, cancelling");
            let params = to_raw(&json!({"requestId": id, "reason": "request cancelled by caller"})).ok();
            let cancel = JsonRpcRequest::notification(methods::CANCELLED, params);
            let _ = self.peer.outgoing.try_send(JsonRpcMessage::Request(cancel));
        }
    }
}

async fn write_loop<W>(
    label: &'static str,
    writer: W,
    mut outgoing: mpsc::Receiver<JsonRpcMessage>,
    pending: Arc<PendingMap>,
) where
    W: AsyncWrite + Unpin,
{
    let mut sink = FramedWrite::new(writer, LinesCodec::new());

    while let Some(message) = outgoing.recv().await {
        let line = match serde_json::to_string(&message) {
            Ok(line) => line,
            Err(e) => {
                warn!(peer = label, error = %e, "failed to serialize outgoing message");
                continue;
            }
        };
        if let Err(e) = sink.send(line).await {
            warn!(peer = label, error = %e, "write failed, closing writer");
            break;
        }
    }

    // Nothing queued behind a failed write will be answered.
    lock(&pending).clear();
    debug!(peer = label, "writer stopped");
}

async fn read_loop<R>(
    label: &'static str,
    reader: R,
    pending: Arc<PendingMap>,
    inbound: mpsc::Sender<Inbound>,
) where
    R: AsyncRead + Unpin,
{
    let mut lines = FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_MESSAGE_BYTES));

    while let Some(frame) = lines.next().await {
        let line = match frame {
            Ok(line) => line,
            Err(LinesCodecError::MaxLineLengthExceeded) => {
                warn!(peer = label, max_bytes = MAX_MESSAGE_BYTES, "dropping oversized message");
                continue;
            }
            Err(LinesCodecError::Io(e)) => {
                warn!(peer = label, error = %e, "read failed");
                break;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let message = match serde_json::from_str::<JsonRpcMessage>(line) {
            Ok(message) => message,
            Err(e) => {
                warn!(peer = label, error = %e, "ignoring malformed message");
                continue;
            }
        };

        if !dispatch(label, message, &pending, &inbound).await {
            break;
        }
    }

    // Dropping the senders wakes every waiter with ConnectionClosed.
    lock(&pending).clear();
    debug!(peer = label, "reader stopped");
}

/// Route one parsed message. Returns false once the owner has gone away.
async fn dispatch(
    label: &'static str,
    message: JsonRpcMessage,
    pending: &PendingMap,
    inbound: &mpsc::Sender<Inbound>,
) -> bool {
    match message {
        JsonRpcMessage::Request(request) if request.jsonrpc != JSONRPC_VERSION => {
            warn!(peer = label, version = %request.jsonrpc, "ignoring message with unsupported version");
            true
        }
        JsonRpcMessage::Request(JsonRpcRequest {
            id: Some(id),
            method,
            params,
            ..
        }) => inbound
            .send(Inbound::Request(IncomingRequest { id, method, params }))
            .await
            .is_ok(),
        JsonRpcMessage::Request(JsonRpcRequest {
            id: None,
            method,
            params,
            ..
        }) => inbound
            .send(Inbound::Notification(IncomingNotification { method, params }))
            .await
            .is_ok(),
        JsonRpcMessage::Response(response) => {
            let Some(id) = response.id else {
                warn!(peer = label, error = ?response.error, "received error response without id");
                return true;
            };
            let reply = match (response.result, response.error) {
                (_, Some(error)) => Err(error),
                (Some(result), None) => Ok(result),
                (None, None) => Ok(RawJson::default()),
            };
            match lock(pending).remove(&id) {
                Some(waiter) => {
                    let _ = waiter.send(reply);
                }
                None => debug!(peer = label, %id, "response for unknown request id"),
            }
            true
        }
    }
}

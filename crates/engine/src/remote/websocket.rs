// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Remote store backed by a `kvs-remote` relay over WebSocket.
//!
//! One background task owns the socket. Requests carry an id and are
//! answered through a oneshot; subscriptions are keyed by path. When the
//! socket drops, every waiting request and subscription fails with
//! `Unavailable` and the next call reconnects.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use kvs_core::protocol::{ClientMessage, ServerMessage};
use kvs_core::RemoteDocument;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use super::{DocumentEvent, RemoteError, RemoteFuture, RemoteResult, RemoteStore, Subscription};

/// Error type for the socket layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Connection closed unexpectedly.
    #[error("connection closed")]
    ConnectionClosed,

    /// Send failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// No reply arrived in time.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    SerializationError(String),
}

impl From<TransportError> for RemoteError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::SerializationError(msg) => RemoteError::InvalidArgument(msg),
            other => RemoteError::Unavailable(other.to_string()),
        }
    }
}

pub(super) enum Command {
    Request {
        id: u64,
        message: ClientMessage,
        reply: oneshot::Sender<RemoteResult<ServerMessage>>,
    },
    Subscribe {
        path: String,
        events: mpsc::UnboundedSender<DocumentEvent>,
    },
    Unsubscribe {
        path: String,
    },
    /// The caller gave up waiting for request `id`.
    Cancel {
        id: u64,
    },
    #[cfg(test)]
    PendingCount {
        reply: oneshot::Sender<usize>,
    },
}

struct Inner {
    url: String,
    user_id: String,
    timeout: Duration,
    commands: Mutex<Option<mpsc::UnboundedSender<Command>>>,
    next_id: AtomicU64,
}

/// A [`RemoteStore`] speaking the relay protocol.
#[derive(Clone)]
pub struct WebSocketRemote {
    inner: Arc<Inner>,
}

impl WebSocketRemote {
    /// Creates a client for `url` acting as `user_id`. Connects lazily.
    pub fn new(url: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self::with_timeout(url, user_id, Duration::from_secs(10))
    }

    /// Like [`new`](Self::new), bounding connects and replies by `timeout`.
    pub fn with_timeout(
        url: impl Into<String>,
        user_id: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        WebSocketRemote {
            inner: Arc::new(Inner {
                url: url.into(),
                user_id: user_id.into(),
                timeout,
                commands: Mutex::new(None),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// The user this client identifies as.
    pub fn user_id(&self) -> &str {
        &self.inner.user_id
    }

    /// Returns the command channel of a live connection, connecting if needed.
    pub(super) async fn connection(&self) -> Result<mpsc::UnboundedSender<Command>, TransportError> {
        let mut guard = self.inner.commands.lock().await;
        if let Some(commands) = guard.as_ref() {
            if !commands.is_closed() {
                return Ok(commands.clone());
            }
        }

        let connect = tokio_tungstenite::connect_async(self.inner.url.as_str());
        let (ws_stream, _) = tokio::time::timeout(self.inner.timeout, connect)
            .await
            .map_err(|_| TransportError::Timeout(self.inner.timeout))?
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
        let (mut sink, stream) = ws_stream.split();

        let hello = ClientMessage::hello(self.inner.user_id.as_str())
            .to_json()
            .map_err(|e| TransportError::SerializationError(e.to_string()))?;
        sink.send(Message::Text(hello.into()))
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;
        info!(url = %self.inner.url, user = %self.inner.user_id, "connected to remote");

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_connection(sink, stream, rx));
        *guard = Some(tx.clone());
        Ok(tx)
    }

    async fn request(&self, build: impl FnOnce(u64) -> ClientMessage) -> RemoteResult<ServerMessage> {
        let commands = self.connection().await?;
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (reply, rx) = oneshot::channel();
        commands
            .send(Command::Request {
                id,
                message: build(id),
                reply,
            })
            .map_err(|_| TransportError::ConnectionClosed)?;

        match tokio::time::timeout(self.inner.timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(TransportError::ConnectionClosed.into()),
            Err(_) => {
                let _ = commands.send(Command::Cancel { id });
                Err(TransportError::Timeout(self.inner.timeout).into())
            }
        }
    }
}

fn unexpected(msg: &ServerMessage) -> RemoteError {
    RemoteError::InvalidArgument(format!("unexpected reply: {:?}", msg))
}

impl RemoteStore for WebSocketRemote {
    fn get_snapshot<'a>(&'a self, path: &'a str) -> RemoteFuture<'a, Option<RemoteDocument>> {
        Box::pin(async move {
            match self.request(|id| ClientMessage::get(id, path)).await? {
                ServerMessage::Snapshot { document, .. } => Ok(document),
                other => Err(unexpected(&other)),
            }
        })
    }

    fn subscribe<'a>(&'a self, path: &'a str) -> RemoteFuture<'a, Subscription> {
        Box::pin(async move {
            let commands = self.connection().await?;
            let (events, rx) = mpsc::unbounded_channel();
            commands
                .send(Command::Subscribe {
                    path: path.to_string(),
                    events,
                })
                .map_err(|_| TransportError::ConnectionClosed)?;

            let path = path.to_string();
            Ok(Subscription::new(rx).on_drop(move || {
                let _ = commands.send(Command::Unsubscribe { path });
            }))
        })
    }

    fn commit<'a>(
        &'a self,
        path: &'a str,
        expected_version: u64,
        document: RemoteDocument,
    ) -> RemoteFuture<'a, u64> {
        Box::pin(async move {
            let reply = self
                .request(|id| ClientMessage::commit(id, path, expected_version, document))
                .await?;
            match reply {
                ServerMessage::Committed { version, .. } => Ok(version),
                other => Err(unexpected(&other)),
            }
        })
    }
}

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Owns the socket: forwards commands out, routes replies and changes in.
async fn run_connection(
    mut sink: futures_util::stream::SplitSink<WsStream, Message>,
    mut stream: futures_util::stream::SplitStream<WsStream>,
    mut commands: mpsc::UnboundedReceiver<Command>,
) {
    let mut pending: HashMap<u64, oneshot::Sender<RemoteResult<ServerMessage>>> = HashMap::new();
    let mut subscriptions: HashMap<String, mpsc::UnboundedSender<DocumentEvent>> = HashMap::new();

    loop {
        tokio::select! {
            command = commands.recv() => {
                let Some(command) = command else {
                    break;
                };
                let message = match command {
                    Command::Request { id, message, reply } => {
                        // Callers dropped mid-request never send a cancel
                        pending.retain(|_, reply| !reply.is_closed());
                        pending.insert(id, reply);
                        message
                    }
                    Command::Cancel { id } => {
                        if pending.remove(&id).is_some() {
                            debug!(id, "request abandoned after timeout");
                        }
                        continue;
                    }
                    #[cfg(test)]
                    Command::PendingCount { reply } => {
                        let _ = reply.send(pending.len());
                        continue;
                    }
                    Command::Subscribe { path, events } => {
                        subscriptions.insert(path.clone(), events);
                        ClientMessage::subscribe(path)
                    }
                    Command::Unsubscribe { path } => {
                        // A newer subscription on the same path keeps it open
                        if !subscriptions.get(&path).is_some_and(|tx| tx.is_closed()) {
                            continue;
                        }
                        subscriptions.remove(&path);
                        ClientMessage::unsubscribe(path)
                    }
                };
                let json = match message.to_json() {
                    Ok(json) => json,
                    Err(e) => {
                        warn!("failed to encode message: {}", e);
                        continue;
                    }
                };
                if let Err(e) = sink.send(Message::Text(json.into())).await {
                    warn!("send failed: {}", e);
                    break;
                }
            }

            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => match ServerMessage::from_json(&text) {
                        Ok(msg) => route(msg, &mut pending, &mut subscriptions),
                        Err(e) => warn!("invalid message from remote: {}", e),
                    },
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("remote closed the connection");
                        break;
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        warn!("connection error: {}", e);
                        break;
                    }
                }
            }
        }
    }

    let lost = RemoteError::from(TransportError::ConnectionClosed);
    for (_, reply) in pending.drain() {
        let _ = reply.send(Err(lost.clone()));
    }
    for (_, events) in subscriptions.drain() {
        let _ = events.send(Err(lost.clone()));
    }
    info!("remote connection closed");
}

fn route(
    msg: ServerMessage,
    pending: &mut HashMap<u64, oneshot::Sender<RemoteResult<ServerMessage>>>,
    subscriptions: &mut HashMap<String, mpsc::UnboundedSender<DocumentEvent>>,
) {
    match msg {
        ServerMessage::Snapshot { id, .. }
        | ServerMessage::Committed { id, .. }
        | ServerMessage::Pong { id } => {
            if let Some(reply) = pending.remove(&id) {
                let _ = reply.send(Ok(msg));
            }
        }
        ServerMessage::Rejected {
            id: Some(id),
            code,
            message,
            ..
        } => {
            if let Some(reply) = pending.remove(&id) {
                let _ = reply.send(Err(RemoteError::from_code(code, message)));
            }
        }
        ServerMessage::Rejected {
            path: Some(path),
            code,
            message,
            ..
        } => {
            if let Some(events) = subscriptions.remove(&path) {
                let _ = events.send(Err(RemoteError::from_code(code, message)));
            }
        }
        ServerMessage::Rejected { code, message, .. } => {
            warn!(?code, "unaddressed rejection from remote: {}", message);
        }
        ServerMessage::Change { path, document } => {
            if let Some(events) = subscriptions.get(&path) {
                if events.send(Ok(document)).is_err() {
                    subscriptions.remove(&path);
                }
            }
        }
    }
}

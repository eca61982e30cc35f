// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket server implementation.
//!
//! Handles client connections, request routing, and change fanout to the
//! paths each connection subscribed to.

use std::collections::HashSet;
use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast::error::RecvError;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use kvs_core::path_owner;
use kvs_core::protocol::{ClientMessage, ErrorCode, ServerMessage};

use crate::state::ServerState;

/// Accept connections on `listener` until it fails.
pub async fn serve(listener: TcpListener, state: ServerState) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("Listening on: {}", addr);
    }

    loop {
        let (stream, peer_addr) = listener.accept().await?;
        let state = state.clone();

        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer_addr, state).await {
                error!("Connection error from {}: {}", peer_addr, e);
            }
        });
    }
}

/// Per-connection session: who the client is and what it watches.
#[derive(Debug, Default)]
pub(crate) struct Session {
    pub(crate) user_id: Option<String>,
    pub(crate) subscriptions: HashSet<String>,
}

impl Session {
    /// Checks that the session's user owns `path`.
    fn authorize(&self, path: &str) -> Result<(), (ErrorCode, String)> {
        let Some(user) = self.user_id.as_deref() else {
            return Err((
                ErrorCode::Unauthenticated,
                "send hello before any request".to_string(),
            ));
        };
        match path_owner(path) {
            Some(owner) if owner == user => Ok(()),
            Some(_) => Err((
                ErrorCode::PermissionDenied,
                format!("user '{user}' may not access '{path}'"),
            )),
            None => Err((
                ErrorCode::InvalidArgument,
                format!("'{path}' is not a user document path"),
            )),
        }
    }
}

/// Handle a single WebSocket connection.
pub(crate) async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    state: ServerState,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    info!("New WebSocket connection from: {}", peer_addr);

    let (mut ws_sink, mut ws_stream) = ws_stream.split();

    // Subscribe to broadcasts before serving any request so no commit is missed
    let mut broadcast_rx = state.subscribe();
    let mut session = Session::default();

    loop {
        tokio::select! {
            msg = ws_stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let replies = handle_client_message(&text, &state, &mut session).await;
                        for reply in replies {
                            ws_sink.send(Message::Text(reply.to_json()?.into())).await?;
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("Client {} disconnected", peer_addr);
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        ws_sink.send(Message::Pong(data)).await?;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        error!("WebSocket error from {}: {}", peer_addr, e);
                        break;
                    }
                    None => {
                        info!("Client {} stream ended", peer_addr);
                        break;
                    }
                }
            }

            broadcast = broadcast_rx.recv() => {
                match broadcast {
                    Ok(msg) => {
                        if !is_subscribed(&session, &msg) {
                            continue;
                        }
                        let json = msg.to_json()?;
                        if let Err(e) = ws_sink.send(Message::Text(json.into())).await {
                            warn!("Failed to send change to {}: {}", peer_addr, e);
                            break;
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        // Resend current documents so the client converges
                        warn!("Client {} lagged by {} messages", peer_addr, n);
                        for path in &session.subscriptions {
                            let change = ServerMessage::change(path.as_str(), state.get(path).await);
                            ws_sink.send(Message::Text(change.to_json()?.into())).await?;
                        }
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    info!("Connection closed: {}", peer_addr);
    Ok(())
}

fn is_subscribed(session: &Session, msg: &ServerMessage) -> bool {
    match msg {
        ServerMessage::Change { path, .. } => session.subscriptions.contains(path),
        _ => false,
    }
}

/// Process a client message and return the messages to send back.
pub(crate) async fn handle_client_message(
    text: &str,
    state: &ServerState,
    session: &mut Session,
) -> Vec<ServerMessage> {
    let msg = match ClientMessage::from_json(text) {
        Ok(msg) => msg,
        Err(e) => {
            warn!("Malformed message: {}", e);
            return vec![ServerMessage::Rejected {
                id: None,
                path: None,
                code: ErrorCode::InvalidArgument,
                message: e.to_string(),
            }];
        }
    };
    debug!("Received message: {:?}", msg);

    match msg {
        ClientMessage::Hello { user_id } => {
            if user_id.is_empty() {
                warn!("Ignoring hello with an empty user id");
            } else {
                debug!(user = %user_id, "client identified");
                session.user_id = Some(user_id);
            }
            vec![]
        }

        ClientMessage::Get { id, path } => match session.authorize(&path) {
            Ok(()) => {
                let document = state.get(&path).await;
                vec![ServerMessage::snapshot(id, path, document)]
            }
            Err((code, message)) => vec![ServerMessage::rejected(id, code, message)],
        },

        ClientMessage::Subscribe { path } => match session.authorize(&path) {
            Ok(()) => {
                session.subscriptions.insert(path.clone());
                let document = state.get(&path).await;
                vec![ServerMessage::change(path, document)]
            }
            Err((code, message)) => {
                vec![ServerMessage::subscription_rejected(path, code, message)]
            }
        },

        ClientMessage::Unsubscribe { path } => {
            session.subscriptions.remove(&path);
            vec![]
        }

        ClientMessage::Commit {
            id,
            path,
            expected_version,
            document,
        } => {
            if let Err((code, message)) = session.authorize(&path) {
                return vec![ServerMessage::rejected(id, code, message)];
            }
            match state.commit(&path, expected_version, document).await {
                Ok(version) => vec![ServerMessage::committed(id, version)],
                Err(kvs_core::Error::VersionConflict { expected, actual }) => {
                    debug!(path = %path, expected, actual, "commit raced another writer");
                    vec![ServerMessage::rejected(
                        id,
                        ErrorCode::FailedPrecondition,
                        format!("expected sync version {expected}, found {actual}"),
                    )]
                }
                Err(kvs_core::Error::MalformedDocument(reason)) => {
                    vec![ServerMessage::rejected(id, ErrorCode::InvalidArgument, reason)]
                }
                Err(e) => {
                    error!("Commit to {} failed: {}", path, e);
                    vec![ServerMessage::rejected(id, ErrorCode::Unavailable, e.to_string())]
                }
            }
        }

        ClientMessage::Ping { id } => {
            debug!("Ping received: {}", id);
            vec![ServerMessage::pong(id)]
        }
    }
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;

// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket protocol messages between sync clients and the document relay.
//!
//! The protocol is simple:
//! - Client identifies itself, reads, subscribes to and commits documents
//! - Server answers requests by id and pushes document changes to subscribers

use serde::{Deserialize, Serialize};

use crate::document::RemoteDocument;

/// Why the server refused a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// The connection's user may not access the path.
    PermissionDenied,
    /// The connection has not identified a user.
    Unauthenticated,
    /// The server cannot serve the request right now.
    Unavailable,
    /// A commit raced another writer (sync version mismatch).
    FailedPrecondition,
    /// The request was malformed.
    InvalidArgument,
}

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Identify the user this connection acts for.
    Hello { user_id: String },

    /// Read a document.
    Get { id: u64, path: String },

    /// Receive the document now and after every commit.
    Subscribe { path: String },

    /// Stop receiving changes for a path.
    Unsubscribe { path: String },

    /// Replace a document if its sync version still equals `expected_version`.
    Commit {
        id: u64,
        path: String,
        expected_version: u64,
        document: RemoteDocument,
    },

    /// Ping message for keepalive.
    Ping {
        /// Client-chosen ID echoed in Pong.
        id: u64,
    },
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Response to a Get request. `document` is absent if never written.
    Snapshot {
        id: u64,
        path: String,
        document: Option<RemoteDocument>,
    },

    /// The current document of a subscribed path.
    ///
    /// Sent once on subscribe and again after every commit.
    Change {
        path: String,
        document: Option<RemoteDocument>,
    },

    /// A commit was accepted.
    Committed { id: u64, version: u64 },

    /// A request or subscription was refused.
    Rejected {
        /// Request id, for Get/Commit.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<u64>,
        /// Path, for Subscribe.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
        code: ErrorCode,
        message: String,
    },

    /// Pong response to client Ping.
    Pong {
        /// Echoed from the Ping message.
        id: u64,
    },
}

impl ClientMessage {
    /// Creates a Hello message.
    pub fn hello(user_id: impl Into<String>) -> Self {
        ClientMessage::Hello {
            user_id: user_id.into(),
        }
    }

    /// Creates a Get message.
    pub fn get(id: u64, path: impl Into<String>) -> Self {
        ClientMessage::Get {
            id,
            path: path.into(),
        }
    }

    /// Creates a Subscribe message.
    pub fn subscribe(path: impl Into<String>) -> Self {
        ClientMessage::Subscribe { path: path.into() }
    }

    /// Creates an Unsubscribe message.
    pub fn unsubscribe(path: impl Into<String>) -> Self {
        ClientMessage::Unsubscribe { path: path.into() }
    }

    /// Creates a Commit message.
    pub fn commit(
        id: u64,
        path: impl Into<String>,
        expected_version: u64,
        document: RemoteDocument,
    ) -> Self {
        ClientMessage::Commit {
            id,
            path: path.into(),
            expected_version,
            document,
        }
    }

    /// Creates a Ping message.
    pub fn ping(id: u64) -> Self {
        ClientMessage::Ping { id }
    }

    /// Serializes the message to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes the message from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    /// Creates a Snapshot message.
    pub fn snapshot(id: u64, path: impl Into<String>, document: Option<RemoteDocument>) -> Self {
        ServerMessage::Snapshot {
            id,
            path: path.into(),
            document,
        }
    }

    /// Creates a Change message.
    pub fn change(path: impl Into<String>, document: Option<RemoteDocument>) -> Self {
        ServerMessage::Change {
            path: path.into(),
            document,
        }
    }

    /// Creates a Committed message.
    pub fn committed(id: u64, version: u64) -> Self {
        ServerMessage::Committed { id, version }
    }

    /// Creates a Rejected message answering request `id`.
    pub fn rejected(id: u64, code: ErrorCode, message: impl Into<String>) -> Self {
        ServerMessage::Rejected {
            id: Some(id),
            path: None,
            code,
            message: message.into(),
        }
    }

    /// Creates a Rejected message for a subscription on `path`.
    pub fn subscription_rejected(
        path: impl Into<String>,
        code: ErrorCode,
        message: impl Into<String>,
    ) -> Self {
        ServerMessage::Rejected {
            id: None,
            path: Some(path.into()),
            code,
            message: message.into(),
        }
    }

    /// Creates a Pong message.
    pub fn pong(id: u64) -> Self {
        ServerMessage::Pong { id }
    }

    /// Serializes the message to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes the message from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;

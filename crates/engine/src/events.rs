// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Notifications published to the host.
//!
//! The engine never touches host UI. Hosts subscribe to a broadcast of
//! [`SyncEvent`]s and react to remote changes and failures themselves.

use kvs_core::SyncValue;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::error::{ErrorKind, RemoteError};

/// Capacity of the event channel; slow receivers lag rather than block the engine.
const EVENT_CAPACITY: usize = 256;

/// Where a change came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeSource {
    Remote,
}

/// A key changed in the local store because of a remote update.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeEvent {
    pub namespace: String,
    pub key: String,
    /// New value, `None` if the key was deleted.
    pub value: Option<SyncValue>,
    pub source: ChangeSource,
}

/// Events emitted by the sync engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncEvent {
    Changed(ChangeEvent),
    /// A batch of local writes reached the remote store.
    Flushed {
        namespace: String,
        keys: usize,
        version: u64,
    },
    /// Something failed; `kind` says whether the engine will retry.
    Error {
        namespace: String,
        kind: ErrorKind,
        message: String,
    },
}

impl SyncEvent {
    pub fn remote_change(namespace: &str, key: &str, value: Option<SyncValue>) -> Self {
        SyncEvent::Changed(ChangeEvent {
            namespace: namespace.to_string(),
            key: key.to_string(),
            value,
            source: ChangeSource::Remote,
        })
    }

    pub fn remote_error(namespace: &str, err: &RemoteError) -> Self {
        SyncEvent::Error {
            namespace: namespace.to_string(),
            kind: err.kind(),
            message: err.to_string(),
        }
    }

    pub fn error(namespace: &str, kind: ErrorKind, message: impl Into<String>) -> Self {
        SyncEvent::Error {
            namespace: namespace.to_string(),
            kind,
            message: message.into(),
        }
    }
}

/// Fan-out of [`SyncEvent`]s to any number of receivers.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SyncEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        EventBus { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.tx.subscribe()
    }

    /// Publishes an event. Having no receivers is fine.
    pub fn emit(&self, event: SyncEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

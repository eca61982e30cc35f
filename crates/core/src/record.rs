// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Per-key records: local revision bookkeeping, pending writes, and the
//! remote record shape.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::stamp::Stamp;
use crate::value::{content_hash, SyncValue, TOMBSTONE_HASH};

/// Local bookkeeping for a single key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRevision {
    /// Monotonically non-decreasing revision counter.
    pub revision: u64,
    /// Time of the last applied write, in epoch milliseconds.
    pub updated_at: u64,
    /// Hash of the value last written or applied.
    pub content_hash: String,
}

impl KeyRevision {
    /// Returns the `(updated_at, revision)` stamp.
    pub fn stamp(&self) -> Stamp {
        Stamp::new(self.updated_at, self.revision)
    }
}

/// A local change waiting to be flushed to the remote store.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingWrite {
    /// The value to transmit, `None` for a deletion.
    pub value: Option<SyncValue>,
    pub revision: u64,
    pub updated_at: u64,
    pub deleted: bool,
    /// Hash of `value`, computed when the write is created.
    pub hash: String,
}

impl PendingWrite {
    /// Creates a pending write, deriving the hash and tombstone flag from the value.
    pub fn new(value: Option<SyncValue>, revision: u64, updated_at: u64) -> Self {
        let hash = content_hash(value.as_ref());
        PendingWrite {
            deleted: value.is_none(),
            value,
            revision,
            updated_at,
            hash,
        }
    }
}

/// Marker for values the remote store fills in at commit time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerValueKind {
    #[serde(rename = "timestamp")]
    Timestamp,
}

/// A server-value sentinel, serialized as `{".sv": "timestamp"}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerValue {
    #[serde(rename = ".sv")]
    pub kind: ServerValueKind,
}

/// A remote timestamp: resolved milliseconds, or a sentinel awaiting commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Timestamp {
    Millis(u64),
    Server(ServerValue),
}

impl Timestamp {
    /// The server timestamp sentinel.
    pub fn server() -> Self {
        Timestamp::Server(ServerValue {
            kind: ServerValueKind::Timestamp,
        })
    }

    /// Returns the resolved milliseconds, or `None` for an unresolved sentinel.
    pub fn millis(&self) -> Option<u64> {
        match self {
            Timestamp::Millis(ms) => Some(*ms),
            Timestamp::Server(_) => None,
        }
    }

    /// Replaces a sentinel with `now_ms`.
    pub fn resolve(&mut self, now_ms: u64) {
        if let Timestamp::Server(_) = self {
            *self = Timestamp::Millis(now_ms);
        }
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Timestamp::Millis(0)
    }
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// A key's record as stored in the remote document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteRecord {
    /// The value; `null` for tombstones.
    #[serde(default)]
    pub value: Value,
    pub rev: u64,
    pub updated_at: Timestamp,
    pub hash: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub deleted: bool,
}

impl RemoteRecord {
    /// Builds the record a pending write is transmitted as.
    pub fn from_pending(pending: &PendingWrite, updated_at: Timestamp) -> Self {
        if pending.deleted {
            return RemoteRecord::tombstone(pending.revision, updated_at);
        }
        RemoteRecord {
            value: pending
                .value
                .as_ref()
                .map(SyncValue::to_json)
                .unwrap_or(Value::Null),
            rev: pending.revision,
            updated_at,
            hash: pending.hash.clone(),
            deleted: false,
        }
    }

    /// Builds a deletion marker.
    pub fn tombstone(rev: u64, updated_at: Timestamp) -> Self {
        RemoteRecord {
            value: Value::Null,
            rev,
            updated_at,
            hash: TOMBSTONE_HASH.to_string(),
            deleted: true,
        }
    }

    /// Builds a live record for `value`.
    pub fn live(value: &SyncValue, rev: u64, updated_at: Timestamp) -> Self {
        RemoteRecord {
            value: value.to_json(),
            rev,
            updated_at,
            hash: content_hash(Some(value)),
            deleted: false,
        }
    }

    /// Parses and validates a record read from a remote document.
    pub fn parse(key: &str, raw: &Value) -> Result<Self> {
        let record: RemoteRecord =
            serde_json::from_value(raw.clone()).map_err(|e| Error::MalformedRecord {
                key: key.to_string(),
                reason: e.to_string(),
            })?;
        record.validate(key)?;
        Ok(record)
    }

    /// Checks the record is usable: resolved timestamp, a revision that can
    /// still advance, and a hash matching the value.
    pub fn validate(&self, key: &str) -> Result<()> {
        let malformed = |reason: &str| Error::MalformedRecord {
            key: key.to_string(),
            reason: reason.to_string(),
        };

        if self.updated_at.millis().is_none() {
            return Err(malformed("unresolved server timestamp"));
        }
        if self.rev == u64::MAX {
            return Err(malformed("revision cannot advance"));
        }
        if self.hash != content_hash(self.sync_value().as_ref()) {
            return Err(malformed("hash does not match value"));
        }
        Ok(())
    }

    /// Returns the value, or `None` for tombstones.
    pub fn sync_value(&self) -> Option<SyncValue> {
        if self.deleted {
            None
        } else {
            Some(SyncValue::from(self.value.clone()))
        }
    }

    /// Returns the record's stamp, if its timestamp is resolved.
    pub fn stamp(&self) -> Option<Stamp> {
        self.updated_at
            .millis()
            .map(|ms| Stamp::new(ms, self.rev))
    }

    /// Returns the revision bookkeeping this record implies once applied.
    pub fn key_revision(&self) -> Option<KeyRevision> {
        Some(KeyRevision {
            revision: self.rev,
            updated_at: self.updated_at.millis()?,
            content_hash: self.hash.clone(),
        })
    }
}

#[cfg(test)]
#[path = "record_tests.rs"]
mod tests;

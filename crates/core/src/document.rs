// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The per-namespace remote document.
//!
//! Shape:
//!
//! ```text
//! {
//!   "data": { "<key>": { "value", "rev", "updatedAt", "hash", "deleted"? } },
//!   "meta": { "lastUpdated", "syncVersion" }
//! }
//! ```
//!
//! Records are kept as raw JSON so one malformed key never prevents reading
//! the rest of the document.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::record::{RemoteRecord, ServerValue, ServerValueKind, Timestamp};

/// Document-level metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMeta {
    #[serde(default)]
    pub last_updated: Timestamp,
    #[serde(default)]
    pub sync_version: u64,
}

/// A namespace's remote document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteDocument {
    #[serde(default)]
    pub data: BTreeMap<String, Value>,
    #[serde(default)]
    pub meta: DocumentMeta,
}

impl RemoteDocument {
    /// Returns the sync version (0 for a document that was never written).
    pub fn version(&self) -> u64 {
        self.meta.sync_version
    }

    /// Returns the parsed record for a key, if present.
    pub fn record(&self, key: &str) -> Option<Result<RemoteRecord>> {
        self.data.get(key).map(|raw| RemoteRecord::parse(key, raw))
    }

    /// Iterates all records, parsing each independently.
    pub fn records(&self) -> impl Iterator<Item = (&str, Result<RemoteRecord>)> {
        self.data
            .iter()
            .map(|(key, raw)| (key.as_str(), RemoteRecord::parse(key, raw)))
    }

    /// Stores a record under `key`, replacing any previous record.
    pub fn put_record(&mut self, key: &str, record: &RemoteRecord) -> Result<()> {
        self.data.insert(key.to_string(), serde_json::to_value(record)?);
        Ok(())
    }

    /// Replaces the server-value sentinels in record timestamps and
    /// `meta.lastUpdated` with `now_ms`. Record values are left untouched.
    pub fn resolve_server_values(&mut self, now_ms: u64) {
        for raw in self.data.values_mut() {
            if let Some(updated_at) = raw.get_mut(UPDATED_AT_FIELD) {
                resolve_value(updated_at, now_ms);
            }
        }
        self.meta.last_updated.resolve(now_ms);
    }

    /// Parses a document from JSON text.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::MalformedDocument(e.to_string()))
    }
}

/// Record field holding the write time.
const UPDATED_AT_FIELD: &str = "updatedAt";

fn is_server_timestamp(map: &Map<String, Value>) -> bool {
    let sentinel = ServerValue {
        kind: ServerValueKind::Timestamp,
    };
    map.len() == 1
        && serde_json::to_value(sentinel)
            .map(|v| v.as_object() == Some(map))
            .unwrap_or(false)
}

fn resolve_value(value: &mut Value, now_ms: u64) {
    if matches!(value, Value::Object(map) if is_server_timestamp(map)) {
        *value = Value::from(now_ms);
    }
}

/// Applies a compare-and-swap commit on the remote side.
///
/// `current` is the stored document (`None` if the path was never written).
/// The commit is accepted only if the stored sync version equals
/// `expected_version` and `next` advances it; server values are resolved
/// against `now_ms`.
pub fn apply_commit(
    current: Option<&RemoteDocument>,
    expected_version: u64,
    mut next: RemoteDocument,
    now_ms: u64,
) -> Result<RemoteDocument> {
    let actual = current.map(RemoteDocument::version).unwrap_or(0);
    if actual != expected_version {
        return Err(Error::VersionConflict {
            expected: expected_version,
            actual,
        });
    }
    if next.version() <= actual {
        return Err(Error::MalformedDocument(format!(
            "commit must advance sync version past {actual}"
        )));
    }
    next.resolve_server_values(now_ms);
    Ok(next)
}

/// Returns the remote path of a user's namespace document.
pub fn document_path(user_id: &str, namespace: &str) -> String {
    format!("users/{user_id}/sync/{namespace}")
}

/// Returns the user a document path belongs to, if it is a user path.
pub fn path_owner(path: &str) -> Option<&str> {
    let rest = path.strip_prefix("users/")?;
    let (user, _) = rest.split_once('/')?;
    if user.is_empty() {
        None
    } else {
        Some(user)
    }
}

#[cfg(test)]
#[path = "document_tests.rs"]
mod tests;

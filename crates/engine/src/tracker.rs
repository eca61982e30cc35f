// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Per-namespace revision bookkeeping and sync locks.
//!
//! A sync lock marks a key as being written by the engine itself: while it
//! is held, local interception ignores writes to that key so applying a
//! remote value never echoes it back. Locks expire after a grace period
//! rather than being released explicitly.

use std::collections::HashMap;

use kvs_core::KeyRevision;
use tokio::time::Instant;

/// Tracks the last known revision and any live sync lock per key.
#[derive(Debug, Default)]
pub struct KeyRevisionTracker {
    revisions: HashMap<String, KeyRevision>,
    locks: HashMap<String, Instant>,
}

impl KeyRevisionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&KeyRevision> {
        self.revisions.get(key)
    }

    /// Records `next`, never lowering the stored revision.
    pub fn set(&mut self, key: &str, mut next: KeyRevision) {
        if let Some(current) = self.revisions.get(key) {
            next.revision = next.revision.max(current.revision);
        }
        self.revisions.insert(key.to_string(), next);
    }

    /// Records a local write and returns its new revision, or `None` if
    /// the key's revision is already at its maximum.
    ///
    /// The stamp never moves backwards, even if the local clock does.
    pub fn bump(&mut self, key: &str, content_hash: String, now_ms: u64) -> Option<KeyRevision> {
        let next = match self.revisions.get(key) {
            Some(current) => KeyRevision {
                revision: current.revision.checked_add(1)?,
                updated_at: now_ms.max(current.updated_at),
                content_hash,
            },
            None => KeyRevision {
                revision: 1,
                updated_at: now_ms,
                content_hash,
            },
        };
        self.revisions.insert(key.to_string(), next.clone());
        Some(next)
    }

    /// Holds the sync lock on `key` until `deadline`.
    pub fn lock(&mut self, key: &str, deadline: Instant) {
        self.locks.insert(key.to_string(), deadline);
    }

    /// Returns true while the key's sync lock has not expired.
    pub fn is_locked(&mut self, key: &str, now: Instant) -> bool {
        match self.locks.get(key) {
            Some(deadline) if now < *deadline => true,
            Some(_) => {
                self.locks.remove(key);
                false
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.revisions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.revisions.is_empty()
    }

    /// Forgets all revisions and locks.
    pub fn clear(&mut self) {
        self.revisions.clear();
        self.locks.clear();
    }
}

#[cfg(test)]
#[path = "tracker_tests.rs"]
mod tests;

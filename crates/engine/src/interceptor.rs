// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Change interception for host writes.
//!
//! Hosts write through [`InterceptedStore`], which performs the raw write
//! and then reports it to every namespace tracking the key. Interception is
//! synchronous and never fails: it only updates bookkeeping, records the
//! write in the store's outbox and wakes the debouncer.

use std::sync::Arc;

use kvs_core::{content_hash, LocalStore, SyncValue};
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::coordinator::SyncCoordinator;
use crate::error::Result;
use crate::namespace::{Namespace, Shared};
use crate::queue::FlushSignal;

/// What interception did with a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interception {
    /// The namespace does not track the key.
    Untracked,
    /// The namespace is not syncing.
    Inactive,
    /// The key is under a sync lock; the write came from the engine.
    Echo,
    /// The value hashes the same as the last known one.
    Unchanged,
    /// A pending write was queued.
    Queued,
    /// The key's revision is at its maximum; the write stays local.
    RevisionExhausted,
}

/// Records a local write to `key` in `ns`. `raw` is the new raw value,
/// `None` for a deletion.
pub(crate) fn intercept(
    ns: &Namespace,
    shared: &Shared,
    key: &str,
    raw: Option<&str>,
) -> Interception {
    if !ns.tracks(key) {
        return Interception::Untracked;
    }

    {
        let mut state = ns.lock();
        if !state.active {
            return Interception::Inactive;
        }
        if state.tracker.is_locked(key, Instant::now()) {
            trace!(namespace = %ns.id, key, "write under sync lock ignored");
            return Interception::Echo;
        }

        let value = raw.map(SyncValue::from_raw);
        let hash = content_hash(value.as_ref());
        if state
            .tracker
            .get(key)
            .is_some_and(|current| current.content_hash == hash)
        {
            trace!(namespace = %ns.id, key, "unchanged value ignored");
            return Interception::Unchanged;
        }

        let state = &mut *state;
        let Some(write) = state
            .queue
            .enqueue(&mut state.tracker, key, value, shared.clock.now_ms())
        else {
            warn!(namespace = %ns.id, key, "revision cannot advance, write not synced");
            return Interception::RevisionExhausted;
        };
        ns.save_outbox(shared.store.as_ref(), key, Some(&write));
        debug!(
            namespace = %ns.id,
            key,
            revision = write.revision,
            deleted = write.deleted,
            "queued local write"
        );
    }

    ns.signal(FlushSignal::Write);
    Interception::Queued
}

/// A local store whose writes are reported to a [`SyncCoordinator`].
///
/// Reads go straight to the store. Writes made through the underlying
/// store's raw primitives bypass sync entirely.
#[derive(Clone)]
pub struct InterceptedStore {
    store: Arc<dyn LocalStore>,
    coordinator: SyncCoordinator,
}

impl InterceptedStore {
    pub(crate) fn new(store: Arc<dyn LocalStore>, coordinator: SyncCoordinator) -> Self {
        InterceptedStore { store, coordinator }
    }

    pub fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.store.get(key)?)
    }

    pub fn keys(&self) -> Result<Vec<String>> {
        Ok(self.store.keys()?)
    }

    /// Writes `value` and queues it for sync.
    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        self.store.raw_set(key, value)?;
        self.coordinator.on_local_write(key, Some(value));
        Ok(())
    }

    /// Deletes `key` and queues the deletion for sync.
    pub fn delete(&self, key: &str) -> Result<()> {
        self.store.raw_delete(key)?;
        self.coordinator.on_local_write(key, None);
        Ok(())
    }

    /// Reports a change another process made to the shared store.
    ///
    /// Goes through the same checks as a direct write, so a change this
    /// engine applied itself is still recognized as an echo.
    pub fn notify_external_change(&self, key: &str, value: Option<&str>) {
        self.coordinator.on_local_write(key, value);
    }

    /// The underlying store.
    pub fn raw(&self) -> &Arc<dyn LocalStore> {
        &self.store
    }
}

#[cfg(test)]
#[path = "interceptor_tests.rs"]
mod tests;

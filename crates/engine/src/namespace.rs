// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! State of one syncing namespace, shared by its background tasks.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

use kvs_core::{
    document_path, ClockSource, KeyRevision, LocalStore, OutboxEntry, PendingWrite, SyncValue,
};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::config::SyncConfig;
use crate::events::{EventBus, SyncEvent};
use crate::queue::{FlushSignal, WriteQueue};
use crate::reconciler::ReconcileState;
use crate::remote::{RemoteError, RemoteStore};
use crate::tracker::KeyRevisionTracker;

/// Handles every namespace task needs.
pub(crate) struct Shared {
    pub store: Arc<dyn LocalStore>,
    pub remote: Arc<dyn RemoteStore>,
    pub clock: Arc<dyn ClockSource>,
    pub config: SyncConfig,
    pub events: EventBus,
}

/// Where a namespace's writes go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Remote,
    /// Remote access was refused; writes stay local.
    LocalOnly,
}

/// Snapshot of a namespace's sync state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncStatus {
    pub namespace: String,
    pub active: bool,
    pub backend: BackendKind,
    /// Whether the remote subscription is live.
    pub subscribed: bool,
    /// Number of tracked keys.
    pub key_count: usize,
    /// Consecutive failed flushes.
    pub retry_count: u32,
    /// Epoch milliseconds of the last successful flush.
    pub last_sync_time: Option<u64>,
    /// Writes waiting for the next flush.
    pub queue_size: usize,
    pub last_error: Option<String>,
}

pub(crate) struct NamespaceState {
    pub active: bool,
    pub backend: BackendKind,
    pub subscribed: bool,
    pub retry_count: u32,
    pub last_sync_time: Option<u64>,
    pub last_error: Option<String>,
    pub tracker: KeyRevisionTracker,
    pub queue: WriteQueue,
    /// The batch currently being committed.
    pub in_flight: BTreeMap<String, PendingWrite>,
}

impl NamespaceState {
    /// True if a local write to `key` has not reached the remote yet.
    pub fn has_unflushed(&self, key: &str) -> bool {
        self.queue.contains(key) || self.in_flight.contains_key(key)
    }

    /// Number of distinct keys with unflushed writes.
    pub fn unflushed_count(&self) -> usize {
        let queued_only = self
            .queue
            .keys()
            .filter(|key| !self.in_flight.contains_key(*key))
            .count();
        self.in_flight.len() + queued_only
    }
}

/// One started namespace.
pub(crate) struct Namespace {
    pub id: String,
    pub user_id: String,
    /// Remote document path.
    pub path: String,
    pub tracked_keys: BTreeSet<String>,
    pub cancel: CancellationToken,
    signals: mpsc::UnboundedSender<FlushSignal>,
    reconcile: watch::Sender<ReconcileState>,
    state: Mutex<NamespaceState>,
}

impl Namespace {
    pub fn new(
        id: &str,
        user_id: &str,
        keys: impl IntoIterator<Item = String>,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<FlushSignal>) {
        let (signals, rx) = mpsc::unbounded_channel();
        let (reconcile, _) = watch::channel(ReconcileState::Pending);
        let ns = Namespace {
            id: id.to_string(),
            user_id: user_id.to_string(),
            path: document_path(user_id, id),
            tracked_keys: keys.into_iter().collect(),
            cancel: CancellationToken::new(),
            signals,
            reconcile,
            state: Mutex::new(NamespaceState {
                active: true,
                backend: BackendKind::Remote,
                subscribed: false,
                retry_count: 0,
                last_sync_time: None,
                last_error: None,
                tracker: KeyRevisionTracker::new(),
                queue: WriteQueue::new(),
                in_flight: BTreeMap::new(),
            }),
        };
        (Arc::new(ns), rx)
    }

    pub fn lock(&self) -> MutexGuard<'_, NamespaceState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn tracks(&self, key: &str) -> bool {
        self.tracked_keys.contains(key)
    }

    /// Wakes the debouncer. Lost only if the namespace already stopped.
    pub fn signal(&self, signal: FlushSignal) {
        let _ = self.signals.send(signal);
    }

    pub fn set_reconcile_state(&self, state: ReconcileState) {
        self.reconcile.send_replace(state);
    }

    pub fn watch_reconcile(&self) -> watch::Receiver<ReconcileState> {
        self.reconcile.subscribe()
    }

    /// Stops syncing after the remote refused access. Local writes keep
    /// working; nothing is sent anymore.
    pub fn deactivate(&self, err: &RemoteError, events: &EventBus) {
        {
            let mut state = self.lock();
            state.active = false;
            state.backend = BackendKind::LocalOnly;
            state.subscribed = false;
            state.last_error = Some(err.to_string());
        }
        error!(namespace = %self.id, "remote access refused, falling back to local-only: {}", err);
        events.emit(SyncEvent::remote_error(&self.id, err));
        self.cancel.cancel();
    }

    /// Mirrors the pending write for `key` into the store's outbox, or
    /// clears the entry once nothing is pending.
    pub fn save_outbox(&self, store: &dyn LocalStore, key: &str, write: Option<&PendingWrite>) {
        let entry = write.map(|write| OutboxEntry {
            revision: write.revision,
            updated_at: write.updated_at,
        });
        if let Err(err) = store.save_outbox(&self.path, key, entry) {
            warn!(namespace = %self.id, key, "cannot record uncommitted write: {}", err);
        }
    }

    /// Queues again the writes an earlier instance left uncommitted.
    ///
    /// Each write carries the key's current local value with the revision
    /// it was given originally. Entries for keys no longer tracked are
    /// dropped. Returns the number of writes queued.
    pub fn restore_outbox(&self, store: &dyn LocalStore) -> usize {
        let entries = match store.outbox(&self.path) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(namespace = %self.id, "cannot read uncommitted writes: {}", err);
                return 0;
            }
        };

        let mut restored = 0;
        {
            let mut state = self.lock();
            for (key, entry) in entries {
                if !self.tracks(&key) {
                    self.save_outbox(store, &key, None);
                    continue;
                }
                let raw = match store.get(&key) {
                    Ok(raw) => raw,
                    Err(err) => {
                        warn!(namespace = %self.id, key = %key, "cannot read local value: {}", err);
                        continue;
                    }
                };
                let write = PendingWrite::new(
                    raw.as_deref().map(SyncValue::from_raw),
                    entry.revision,
                    entry.updated_at,
                );
                state.tracker.set(
                    &key,
                    KeyRevision {
                        revision: entry.revision,
                        updated_at: entry.updated_at,
                        content_hash: write.hash.clone(),
                    },
                );
                debug!(namespace = %self.id, key = %key, revision = entry.revision, "restored uncommitted write");
                state.queue.restore(&key, write);
                restored += 1;
            }
        }

        if restored > 0 {
            self.signal(FlushSignal::Write);
        }
        restored
    }

    /// Cancels every task and forgets in-memory state. Unflushed writes
    /// stay in the store's outbox for the next start.
    pub fn shutdown(&self) {
        self.cancel.cancel();
        let mut state = self.lock();
        state.active = false;
        state.subscribed = false;
        state.tracker.clear();
        state.queue.clear();
        state.in_flight.clear();
    }

    pub fn status(&self) -> SyncStatus {
        let state = self.lock();
        SyncStatus {
            namespace: self.id.clone(),
            active: state.active,
            backend: state.backend,
            subscribed: state.subscribed,
            key_count: self.tracked_keys.len(),
            retry_count: state.retry_count,
            last_sync_time: state.last_sync_time,
            queue_size: state.unflushed_count(),
            last_error: state.last_error.clone(),
        }
    }
}

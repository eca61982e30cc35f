// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Listens for remote document changes and applies them locally.
//!
//! Each delivery is checked key by key against the tracker. A record wins
//! only if its `(updated_at, revision)` stamp beats the local one, and keys
//! with unflushed local writes are left alone until those writes land.
//! Applied writes go through the store's raw primitives under a sync lock
//! so interception does not echo them back.

use std::sync::Arc;

use kvs_core::{applied_revision, resolve, RemoteDocument, RemoteRecord};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::error::{ErrorKind, RemoteError};
use crate::events::SyncEvent;
use crate::namespace::{Namespace, Shared};

/// How a remote record is weighed against local state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ApplyMode {
    /// Apply only if the record wins last-writer-wins ordering.
    Resolve,
    /// Apply regardless of ordering.
    Force,
}

/// Subscribes to the namespace document until cancelled, resubscribing
/// with backoff after transient failures.
pub(crate) async fn run_subscriber(ns: Arc<Namespace>, shared: Arc<Shared>) {
    let config = &shared.config;
    let mut failures = 0u32;

    loop {
        let subscribed = tokio::select! {
            _ = ns.cancel.cancelled() => return,
            result = shared.remote.subscribe(&ns.path) => result,
        };

        let err = match subscribed {
            Ok(mut subscription) => {
                ns.lock().subscribed = true;
                debug!(namespace = %ns.id, path = %ns.path, "subscribed");
                loop {
                    let event = tokio::select! {
                        _ = ns.cancel.cancelled() => return,
                        event = subscription.next() => event,
                    };
                    match event {
                        Some(Ok(document)) => {
                            failures = 0;
                            if let Some(document) = document {
                                apply_document(&ns, &shared, &document);
                            }
                        }
                        Some(Err(err)) => break err,
                        None => break RemoteError::Unavailable("subscription ended".to_string()),
                    }
                }
            }
            Err(err) => err,
        };

        ns.lock().subscribed = false;
        if ns.cancel.is_cancelled() {
            return;
        }

        if err.kind() == ErrorKind::Auth {
            ns.deactivate(&err, &shared.events);
            return;
        }
        shared.events.emit(SyncEvent::remote_error(&ns.id, &err));

        failures += 1;
        if failures > config.max_retry_attempts {
            error!(
                namespace = %ns.id,
                failures,
                "giving up on remote subscription: {}",
                err
            );
            ns.lock().last_error = Some(err.to_string());
            return;
        }

        let delay = config.backoff(failures);
        warn!(namespace = %ns.id, failures, ?delay, "subscription lost, resubscribing: {}", err);
        tokio::select! {
            _ = ns.cancel.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

/// Applies every tracked key of a delivered document. Returns the number
/// of keys written locally.
pub(crate) fn apply_document(ns: &Namespace, shared: &Shared, document: &RemoteDocument) -> usize {
    let mut applied = 0;
    for key in &ns.tracked_keys {
        match document.record(key) {
            None => {}
            Some(Ok(record)) => {
                if apply_remote_record(ns, shared, key, &record, ApplyMode::Resolve) {
                    applied += 1;
                }
            }
            Some(Err(err)) => {
                warn!(namespace = %ns.id, key = %key, "skipping malformed remote record: {}", err);
                shared
                    .events
                    .emit(SyncEvent::error(&ns.id, ErrorKind::Logic, err.to_string()));
            }
        }
    }
    if applied > 0 {
        info!(namespace = %ns.id, applied, version = document.version(), "applied remote changes");
    }
    applied
}

/// Writes one remote record into the local store if it should win.
///
/// Returns true if the local store was written (or a write was attempted
/// and failed for lack of space).
pub(crate) fn apply_remote_record(
    ns: &Namespace,
    shared: &Shared,
    key: &str,
    record: &RemoteRecord,
    mode: ApplyMode,
) -> bool {
    {
        let mut state = ns.lock();
        if !state.active {
            return false;
        }

        let local = state.tracker.get(key).cloned();
        if mode == ApplyMode::Resolve && !state.queue.contains(key) {
            if let Some(local) = local.as_ref().filter(|l| l.content_hash == record.hash) {
                // Our own write coming back, possibly before its commit was
                // acknowledged: the server stamp replaces the local clock's
                if let Some(next) = applied_revision(Some(local), record) {
                    state.tracker.set(key, next);
                }
                return false;
            }
        }
        if state.has_unflushed(key) {
            debug!(namespace = %ns.id, key, "local write pending, remote record deferred");
            return false;
        }

        if mode == ApplyMode::Resolve {
            let resolution = resolve(local.as_ref(), record);
            if !resolution.applies() {
                debug!(namespace = %ns.id, key, ?resolution, "remote record not applied");
                return false;
            }
        }

        let Some(next) = applied_revision(local.as_ref(), record) else {
            return false;
        };
        state
            .tracker
            .lock(key, Instant::now() + shared.config.sync_lock_grace());
        state.tracker.set(key, next);
    }

    let value = record.sync_value();
    let written = match &value {
        Some(value) => shared.store.raw_set(key, &value.to_raw()),
        None => shared.store.raw_delete(key),
    };
    if let Err(err) = written {
        let kind = match err {
            kvs_core::Error::QuotaExceeded(_) => ErrorKind::Quota,
            _ => ErrorKind::Logic,
        };
        warn!(namespace = %ns.id, key, "failed to apply remote value locally: {}", err);
        shared
            .events
            .emit(SyncEvent::error(&ns.id, kind, err.to_string()));
        return true;
    }

    debug!(namespace = %ns.id, key, deleted = value.is_none(), "applied remote record");
    shared
        .events
        .emit(SyncEvent::remote_change(&ns.id, key, value));
    true
}

#[cfg(test)]
#[path = "subscriber_tests.rs"]
mod tests;

// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! First-sync reconciliation between the local store and the remote
//! document.
//!
//! Per tracked key:
//!
//! | local   | remote            | action                         |
//! |---------|-------------------|--------------------------------|
//! | present | absent            | upload at revision 1           |
//! | absent  | present           | apply through conflict rules   |
//! | present | tombstone         | delete locally                 |
//! | present | present, differs  | take the remote value          |
//! | equal   | equal             | adopt the remote bookkeeping   |
//!
//! Keys with an uncommitted local write, including writes restored from the
//! outbox, are left alone and counted as pending. Uploads and pending writes
//! are committed together in one transaction.

use std::sync::Arc;

use kvs_core::{applied_revision, raw_content_hash, RemoteDocument, SyncValue};
use serde::Serialize;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::error::{ErrorKind, Result};
use crate::events::SyncEvent;
use crate::flusher::FlushOutcome;
use crate::namespace::{Namespace, Shared};
use crate::queue::FlushSignal;
use crate::subscriber::{apply_remote_record, ApplyMode};

/// Attempts before reconciliation gives up on transient failures.
const RECONCILE_ATTEMPTS: u32 = 3;

/// What reconciliation did, per key count.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Local-only keys queued for upload.
    pub uploaded: usize,
    /// Keys written from the remote document.
    pub downloaded: usize,
    /// Keys deleted locally because the remote holds a tombstone.
    pub deleted: usize,
    /// Keys already in agreement.
    pub unchanged: usize,
    /// Keys skipped because of malformed records or local read errors.
    pub skipped: usize,
    /// Keys holding an uncommitted local write, sent with the uploads.
    pub pending: usize,
    /// Outcome of committing the uploads, if any were queued.
    pub upload: Option<FlushOutcome>,
}

/// Progress of a namespace's initial reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileState {
    Pending,
    Done(ReconcileReport),
    Failed(String),
}

/// Waits for the reconcile delay, then reconciles, retrying transient
/// failures.
pub(crate) async fn run_reconciler(ns: Arc<Namespace>, shared: Arc<Shared>) {
    tokio::select! {
        _ = ns.cancel.cancelled() => return,
        _ = tokio::time::sleep(shared.config.reconcile_delay()) => {}
    }

    let mut attempt = 0;
    loop {
        attempt += 1;
        let result = tokio::select! {
            _ = ns.cancel.cancelled() => return,
            result = reconcile(&ns, &shared) => result,
        };

        let err = match result {
            Ok(report) => {
                info!(
                    namespace = %ns.id,
                    uploaded = report.uploaded,
                    downloaded = report.downloaded,
                    deleted = report.deleted,
                    unchanged = report.unchanged,
                    "initial reconciliation finished"
                );
                ns.set_reconcile_state(ReconcileState::Done(report));
                return;
            }
            Err(err) => err,
        };

        if let crate::Error::Remote(remote) = &err {
            if remote.kind() == ErrorKind::Auth {
                ns.set_reconcile_state(ReconcileState::Failed(err.to_string()));
                ns.deactivate(remote, &shared.events);
                return;
            }
        }
        shared
            .events
            .emit(SyncEvent::error(&ns.id, err.kind(), err.to_string()));

        if err.kind() != ErrorKind::Transient || attempt >= RECONCILE_ATTEMPTS {
            warn!(namespace = %ns.id, attempt, "initial reconciliation failed: {}", err);
            ns.set_reconcile_state(ReconcileState::Failed(err.to_string()));
            return;
        }

        let delay = shared.config.backoff(attempt);
        warn!(namespace = %ns.id, attempt, ?delay, "reconciliation failed, retrying: {}", err);
        tokio::select! {
            _ = ns.cancel.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

/// Reconciles every tracked key once and commits the uploads.
///
/// Running it again without intervening changes writes nothing.
pub(crate) async fn reconcile(ns: &Namespace, shared: &Shared) -> Result<ReconcileReport> {
    let snapshot = shared.remote.get_snapshot(&ns.path).await?;
    let mut report = reconcile_snapshot(ns, shared, snapshot.as_ref());

    if report.uploaded > 0 || report.pending > 0 {
        let (reply, rx) = oneshot::channel();
        ns.signal(FlushSignal::Now(Some(reply)));
        let outcome = rx.await.unwrap_or(FlushOutcome::Cancelled);
        if let FlushOutcome::Failed { kind, message, .. } = &outcome {
            debug!(namespace = %ns.id, ?kind, "upload of local-only keys failed: {}", message);
        }
        report.upload = Some(outcome);
    }
    Ok(report)
}

fn reconcile_snapshot(
    ns: &Namespace,
    shared: &Shared,
    snapshot: Option<&RemoteDocument>,
) -> ReconcileReport {
    let mut report = ReconcileReport::default();

    for key in &ns.tracked_keys {
        if ns.lock().has_unflushed(key) {
            debug!(namespace = %ns.id, key = %key, "uncommitted local write takes precedence");
            report.pending += 1;
            continue;
        }
        let local = match shared.store.get(key) {
            Ok(local) => local,
            Err(err) => {
                warn!(namespace = %ns.id, key = %key, "cannot read local value: {}", err);
                report.skipped += 1;
                continue;
            }
        };
        let remote = match snapshot.and_then(|doc| doc.record(key)) {
            None => None,
            Some(Ok(record)) => Some(record),
            Some(Err(err)) => {
                warn!(namespace = %ns.id, key = %key, "skipping malformed remote record: {}", err);
                shared
                    .events
                    .emit(SyncEvent::error(&ns.id, ErrorKind::Logic, err.to_string()));
                report.skipped += 1;
                continue;
            }
        };

        match (local, remote) {
            (None, None) => {}
            (Some(raw), None) => {
                let mut state = ns.lock();
                if state.has_unflushed(key) {
                    report.pending += 1;
                    continue;
                }
                let state = &mut *state;
                let value = Some(SyncValue::from_raw(&raw));
                let Some(write) =
                    state
                        .queue
                        .enqueue(&mut state.tracker, key, value, shared.clock.now_ms())
                else {
                    warn!(namespace = %ns.id, key = %key, "revision cannot advance, local-only key skipped");
                    report.skipped += 1;
                    continue;
                };
                ns.save_outbox(shared.store.as_ref(), key, Some(&write));
                debug!(namespace = %ns.id, key = %key, "queued local-only key for upload");
                report.uploaded += 1;
            }
            (None, Some(record)) if record.deleted => {
                adopt(ns, key, &record);
                report.unchanged += 1;
            }
            (None, Some(record)) => {
                if apply_remote_record(ns, shared, key, &record, ApplyMode::Resolve) {
                    report.downloaded += 1;
                } else {
                    report.unchanged += 1;
                }
            }
            (Some(raw), Some(record)) => {
                if raw_content_hash(Some(&raw)) == record.hash {
                    adopt(ns, key, &record);
                    report.unchanged += 1;
                } else if apply_remote_record(ns, shared, key, &record, ApplyMode::Force) {
                    if record.deleted {
                        report.deleted += 1;
                    } else {
                        report.downloaded += 1;
                    }
                } else {
                    report.skipped += 1;
                }
            }
        }
    }

    report
}

/// Seeds the tracker from a record that already matches the local store.
fn adopt(ns: &Namespace, key: &str, record: &kvs_core::RemoteRecord) {
    let mut state = ns.lock();
    if state.has_unflushed(key) {
        return;
    }
    let local = state.tracker.get(key).cloned();
    if let Some(next) = applied_revision(local.as_ref(), record) {
        state.tracker.set(key, next);
    }
}

#[cfg(test)]
#[path = "reconciler_tests.rs"]
mod tests;

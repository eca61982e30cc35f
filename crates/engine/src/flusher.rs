// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Commits batches of pending writes to the remote document.
//!
//! A batch goes out as one compare-and-swap transaction that writes every
//! record, bumps the document's sync version and stamps it with the server
//! clock. Failed batches return to the queue without clobbering writes made
//! meanwhile, and are retried with exponential backoff up to the configured
//! attempt limit.

use std::collections::BTreeMap;
use std::sync::Arc;

use kvs_core::{PendingWrite, RemoteRecord};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::ErrorKind;
use crate::events::SyncEvent;
use crate::namespace::{Namespace, Shared};
use crate::remote::{transact, RemoteError, RemoteResult};

/// How a flush cycle ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FlushOutcome {
    /// The batch was committed at `version`.
    Committed { keys: usize, version: u64 },
    /// Nothing was queued.
    Idle,
    /// The batch is still queued after `attempts` failures.
    Failed {
        kind: ErrorKind,
        message: String,
        attempts: u32,
    },
    /// The namespace no longer syncs.
    Inactive,
    /// The namespace stopped mid-flush; the result was discarded.
    Cancelled,
}

pub(crate) struct RemoteFlusher {
    shared: Arc<Shared>,
}

impl RemoteFlusher {
    pub fn new(shared: Arc<Shared>) -> Self {
        RemoteFlusher { shared }
    }

    /// Commits `batch` in a single transaction and returns the new version.
    pub async fn flush(
        &self,
        ns: &Namespace,
        batch: &BTreeMap<String, PendingWrite>,
    ) -> RemoteResult<u64> {
        let stamp = self.shared.remote.server_timestamp();
        let document = transact(self.shared.remote.as_ref(), &ns.path, |doc| {
            for (key, write) in batch {
                doc.put_record(key, &RemoteRecord::from_pending(write, stamp))
                    .map_err(RemoteError::from)?;
            }
            doc.meta.sync_version += 1;
            doc.meta.last_updated = stamp;
            Ok(())
        })
        .await?;
        Ok(document.version())
    }

    /// Flushes whatever is queued, retrying transient failures.
    pub async fn flush_cycle(&self, ns: &Namespace) -> FlushOutcome {
        let config = &self.shared.config;
        let mut attempts = 0u32;

        loop {
            let batch = {
                let mut state = ns.lock();
                if !state.active {
                    return FlushOutcome::Inactive;
                }
                let batch = state.queue.take_all();
                state.in_flight = batch.clone();
                batch
            };
            if batch.is_empty() {
                return FlushOutcome::Idle;
            }

            let result = tokio::select! {
                _ = ns.cancel.cancelled() => return FlushOutcome::Cancelled,
                result = self.flush(ns, &batch) => result,
            };
            if ns.cancel.is_cancelled() {
                return FlushOutcome::Cancelled;
            }
            attempts += 1;

            let err = match result {
                Ok(version) => {
                    let keys = batch.len();
                    {
                        let mut state = ns.lock();
                        state.in_flight.clear();
                        for key in batch.keys().filter(|key| !state.queue.contains(key)) {
                            ns.save_outbox(self.shared.store.as_ref(), key, None);
                        }
                        state.retry_count = 0;
                        state.last_error = None;
                        state.last_sync_time = Some(self.shared.clock.now_ms());
                    }
                    info!(namespace = %ns.id, keys, version, "flushed local writes");
                    self.shared.events.emit(SyncEvent::Flushed {
                        namespace: ns.id.clone(),
                        keys,
                        version,
                    });
                    return FlushOutcome::Committed { keys, version };
                }
                Err(err) => err,
            };

            {
                let mut state = ns.lock();
                state.in_flight.clear();
                state.queue.requeue(batch);
                state.retry_count += 1;
                state.last_error = Some(err.to_string());
            }

            if err.kind() == ErrorKind::Auth {
                ns.deactivate(&err, &self.shared.events);
                return failed(&err, attempts);
            }
            self.shared.events.emit(SyncEvent::remote_error(&ns.id, &err));

            if err.kind() != ErrorKind::Transient || attempts >= config.max_retry_attempts {
                warn!(
                    namespace = %ns.id,
                    attempts,
                    "flush failed, writes stay queued until the next flush: {}",
                    err
                );
                return failed(&err, attempts);
            }

            let delay = config.backoff(attempts);
            warn!(namespace = %ns.id, attempts, ?delay, "flush failed, retrying: {}", err);
            tokio::select! {
                _ = ns.cancel.cancelled() => return FlushOutcome::Cancelled,
                _ = tokio::time::sleep(delay) => {}
            }
            debug!(namespace = %ns.id, "retrying flush");
        }
    }
}

fn failed(err: &RemoteError, attempts: u32) -> FlushOutcome {
    FlushOutcome::Failed {
        kind: err.kind(),
        message: err.to_string(),
        attempts,
    }
}

#[cfg(test)]
#[path = "flusher_tests.rs"]
mod tests;

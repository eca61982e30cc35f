// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Pending local writes and the debouncer that batches them.
//!
//! Writes collapse per key: only the latest pending write for a key is
//! kept. The debouncer flushes once no write has arrived for the quiet
//! period, or immediately on an explicit flush request.

use std::collections::BTreeMap;
use std::sync::Arc;

use kvs_core::{PendingWrite, SyncValue};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::flusher::{FlushOutcome, RemoteFlusher};
use crate::namespace::{Namespace, Shared};
use crate::tracker::KeyRevisionTracker;

/// Latest unflushed write per key.
#[derive(Debug, Default)]
pub struct WriteQueue {
    pending: BTreeMap<String, PendingWrite>,
}

impl WriteQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a write to `key`, bumping its revision in `tracker`.
    ///
    /// Replaces any earlier pending write for the same key. Returns `None`,
    /// queuing nothing, if the key's revision cannot advance.
    pub fn enqueue(
        &mut self,
        tracker: &mut KeyRevisionTracker,
        key: &str,
        value: Option<SyncValue>,
        now_ms: u64,
    ) -> Option<PendingWrite> {
        let write = PendingWrite::new(value, 0, 0);
        let revision = tracker.bump(key, write.hash.clone(), now_ms)?;
        let write = PendingWrite {
            revision: revision.revision,
            updated_at: revision.updated_at,
            ..write
        };
        self.pending.insert(key.to_string(), write.clone());
        Some(write)
    }

    /// Queues `write` as is, without touching any revision.
    pub fn restore(&mut self, key: &str, write: PendingWrite) {
        self.pending.insert(key.to_string(), write);
    }

    /// Removes and returns everything queued.
    pub fn take_all(&mut self) -> BTreeMap<String, PendingWrite> {
        std::mem::take(&mut self.pending)
    }

    /// Puts a failed batch back, keeping any newer write queued meanwhile.
    pub fn requeue(&mut self, batch: BTreeMap<String, PendingWrite>) {
        for (key, write) in batch {
            self.pending.entry(key).or_insert(write);
        }
    }

    pub fn get(&self, key: &str) -> Option<&PendingWrite> {
        self.pending.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.pending.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.pending.keys()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

/// Messages to a namespace's debouncer.
#[derive(Debug)]
pub enum FlushSignal {
    /// A write was queued; restart the quiet period.
    Write,
    /// Flush now, optionally reporting the outcome.
    Now(Option<oneshot::Sender<FlushOutcome>>),
}

/// Runs until the namespace is cancelled, flushing after each quiet period.
///
/// Flushes are serialized: writes that arrive while one is in flight start
/// a fresh window once it finishes.
pub(crate) async fn run_debouncer(
    ns: Arc<Namespace>,
    shared: Arc<Shared>,
    mut signals: mpsc::UnboundedReceiver<FlushSignal>,
) {
    let flusher = RemoteFlusher::new(shared.clone());
    loop {
        let first = tokio::select! {
            _ = ns.cancel.cancelled() => break,
            signal = signals.recv() => match signal {
                Some(signal) => signal,
                None => break,
            },
        };

        let mut waiters = Vec::new();
        let mut immediate = false;
        if let FlushSignal::Now(reply) = first {
            immediate = true;
            waiters.extend(reply);
        }

        while !immediate {
            tokio::select! {
                _ = ns.cancel.cancelled() => return,
                _ = tokio::time::sleep(shared.config.debounce()) => break,
                signal = signals.recv() => match signal {
                    Some(FlushSignal::Write) => continue,
                    Some(FlushSignal::Now(reply)) => {
                        immediate = true;
                        waiters.extend(reply);
                    }
                    None => return,
                },
            }
        }

        let outcome = flusher.flush_cycle(&ns).await;
        debug!(namespace = %ns.id, ?outcome, "flush cycle finished");
        for waiter in waiters {
            let _ = waiter.send(outcome.clone());
        }
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;

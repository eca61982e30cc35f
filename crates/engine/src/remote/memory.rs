// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! In-process remote store.
//!
//! Behaves like the relay server: compare-and-swap commits, server-side
//! timestamps, and subscriptions notified after every commit. Failures can
//! be injected to exercise retry and auth handling.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use kvs_core::{apply_commit, ClockSource, RemoteDocument, SystemClock};
use tokio::sync::mpsc;
use tracing::debug;

use super::{DocumentEvent, RemoteError, RemoteFuture, RemoteResult, RemoteStore, Subscription};

struct Subscriber {
    id: u64,
    tx: mpsc::UnboundedSender<DocumentEvent>,
}

#[derive(Default)]
struct Faults {
    commits: VecDeque<RemoteError>,
    reads: VecDeque<RemoteError>,
    subscribes: VecDeque<RemoteError>,
    denied: Option<RemoteError>,
}

#[derive(Default)]
struct Inner {
    documents: HashMap<String, RemoteDocument>,
    subscribers: HashMap<String, Vec<Subscriber>>,
    next_subscriber: u64,
    faults: Faults,
    commits: usize,
    commit_attempts: usize,
}

impl Inner {
    fn notify(&mut self, path: &str) {
        let document = self.documents.get(path).cloned();
        if let Some(subs) = self.subscribers.get_mut(path) {
            subs.retain(|sub| sub.tx.send(Ok(document.clone())).is_ok());
        }
    }
}

/// A [`RemoteStore`] held entirely in memory.
#[derive(Clone)]
pub struct MemoryRemote {
    inner: Arc<Mutex<Inner>>,
    clock: Arc<dyn ClockSource>,
}

impl MemoryRemote {
    /// Creates an empty store stamped by the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates an empty store whose server timestamps come from `clock`.
    pub fn with_clock(clock: Arc<dyn ClockSource>) -> Self {
        MemoryRemote {
            inner: Arc::new(Mutex::new(Inner::default())),
            clock,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns the stored document at `path`.
    pub fn document(&self, path: &str) -> Option<RemoteDocument> {
        self.lock().documents.get(path).cloned()
    }

    /// Stores `document` as if another device had committed it, bumping the
    /// sync version past the stored one and notifying subscribers.
    pub fn put_document(&self, path: &str, mut document: RemoteDocument) {
        let mut inner = self.lock();
        let current = inner.documents.get(path).map(RemoteDocument::version).unwrap_or(0);
        document.meta.sync_version = document.meta.sync_version.max(current + 1);
        document.resolve_server_values(self.clock.now_ms());
        inner.documents.insert(path.to_string(), document);
        inner.notify(path);
    }

    /// Makes the next `count` commits fail with `err`.
    pub fn fail_commits(&self, count: usize, err: RemoteError) {
        let mut inner = self.lock();
        inner.faults.commits.extend(std::iter::repeat_n(err, count));
    }

    /// Makes the next `count` snapshot reads fail with `err`.
    pub fn fail_reads(&self, count: usize, err: RemoteError) {
        let mut inner = self.lock();
        inner.faults.reads.extend(std::iter::repeat_n(err, count));
    }

    /// Makes the next `count` subscribe calls fail with `err`.
    pub fn fail_subscribes(&self, count: usize, err: RemoteError) {
        let mut inner = self.lock();
        inner.faults.subscribes.extend(std::iter::repeat_n(err, count));
    }

    /// Rejects every request with `PermissionDenied` until cleared with `None`.
    pub fn deny_access(&self, reason: Option<&str>) {
        let mut inner = self.lock();
        inner.faults.denied = reason.map(|r| RemoteError::PermissionDenied(r.to_string()));
    }

    /// Ends every live subscription on `path` with `err`.
    pub fn break_subscriptions(&self, path: &str, err: RemoteError) {
        let mut inner = self.lock();
        if let Some(subs) = inner.subscribers.remove(path) {
            for sub in subs {
                let _ = sub.tx.send(Err(err.clone()));
            }
        }
    }

    /// Number of live subscriptions on `path`.
    pub fn subscriber_count(&self, path: &str) -> usize {
        let mut inner = self.lock();
        match inner.subscribers.get_mut(path) {
            Some(subs) => {
                subs.retain(|sub| !sub.tx.is_closed());
                subs.len()
            }
            None => 0,
        }
    }

    /// Number of accepted commits.
    pub fn commit_count(&self) -> usize {
        self.lock().commits
    }

    /// Number of commit calls, accepted or not.
    pub fn commit_attempts(&self) -> usize {
        self.lock().commit_attempts
    }
}

impl Default for MemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

fn check_access(inner: &Inner) -> RemoteResult<()> {
    match &inner.faults.denied {
        Some(err) => Err(err.clone()),
        None => Ok(()),
    }
}

impl RemoteStore for MemoryRemote {
    fn get_snapshot<'a>(&'a self, path: &'a str) -> RemoteFuture<'a, Option<RemoteDocument>> {
        Box::pin(async move {
            let mut inner = self.lock();
            check_access(&inner)?;
            if let Some(err) = inner.faults.reads.pop_front() {
                return Err(err);
            }
            Ok(inner.documents.get(path).cloned())
        })
    }

    fn subscribe<'a>(&'a self, path: &'a str) -> RemoteFuture<'a, Subscription> {
        Box::pin(async move {
            let mut inner = self.lock();
            check_access(&inner)?;
            if let Some(err) = inner.faults.subscribes.pop_front() {
                return Err(err);
            }

            let (tx, rx) = mpsc::unbounded_channel();
            let _ = tx.send(Ok(inner.documents.get(path).cloned()));

            let id = inner.next_subscriber;
            inner.next_subscriber += 1;
            inner
                .subscribers
                .entry(path.to_string())
                .or_default()
                .push(Subscriber { id, tx });
            debug!(path, id, "memory remote subscription opened");

            let weak = Arc::downgrade(&self.inner);
            let path = path.to_string();
            Ok(Subscription::new(rx).on_drop(move || {
                if let Some(inner) = weak.upgrade() {
                    let mut inner = inner.lock().unwrap_or_else(|e| e.into_inner());
                    if let Some(subs) = inner.subscribers.get_mut(&path) {
                        subs.retain(|sub| sub.id != id);
                    }
                }
            }))
        })
    }

    fn commit<'a>(
        &'a self,
        path: &'a str,
        expected_version: u64,
        document: RemoteDocument,
    ) -> RemoteFuture<'a, u64> {
        Box::pin(async move {
            let mut inner = self.lock();
            inner.commit_attempts += 1;
            check_access(&inner)?;
            if let Some(err) = inner.faults.commits.pop_front() {
                return Err(err);
            }

            let committed = apply_commit(
                inner.documents.get(path),
                expected_version,
                document,
                self.clock.now_ms(),
            )?;
            let version = committed.version();
            inner.documents.insert(path.to_string(), committed);
            inner.commits += 1;
            inner.notify(path);
            Ok(version)
        })
    }
}

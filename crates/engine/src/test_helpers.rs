// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for engine tests.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use kvs_core::{document_path, ClockSource, ManualClock, MemoryStore, RemoteDocument, RemoteRecord, SyncValue};
use tokio::sync::broadcast;

use crate::config::SyncConfig;
use crate::coordinator::{SyncCoordinator, SyncHandle, SyncOptions};
use crate::events::SyncEvent;
use crate::remote::MemoryRemote;

pub const NS: &str = "app";
pub const USER: &str = "alice";
pub const START_MS: u64 = 1_700_000_000_000;

/// A coordinator over in-memory stores. The device and the remote share
/// one manual clock unless built with [`Harness::with_clock_skew`].
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub remote: Arc<MemoryRemote>,
    pub clock: Arc<ManualClock>,
    pub remote_clock: Arc<ManualClock>,
    pub coordinator: SyncCoordinator,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_store(MemoryStore::new())
    }

    pub fn with_store(store: MemoryStore) -> Self {
        let clock = Arc::new(ManualClock::new(START_MS));
        let remote = Arc::new(MemoryRemote::with_clock(clock.clone()));
        Self::build(Arc::new(store), remote, clock.clone(), clock)
    }

    /// The device clock runs `skew_ms` ahead of the remote's.
    pub fn with_clock_skew(skew_ms: u64) -> Self {
        let remote_clock = Arc::new(ManualClock::new(START_MS));
        let remote = Arc::new(MemoryRemote::with_clock(remote_clock.clone()));
        Self::build(
            Arc::new(MemoryStore::new()),
            remote,
            Arc::new(ManualClock::new(START_MS + skew_ms)),
            remote_clock,
        )
    }

    /// A fresh coordinator over the same local store and remote, as after
    /// the process restarts.
    pub fn restart(&self) -> Self {
        Self::build(
            self.store.clone(),
            self.remote.clone(),
            self.clock.clone(),
            self.remote_clock.clone(),
        )
    }

    fn build(
        store: Arc<MemoryStore>,
        remote: Arc<MemoryRemote>,
        clock: Arc<ManualClock>,
        remote_clock: Arc<ManualClock>,
    ) -> Self {
        let coordinator = SyncCoordinator::with_options(
            store.clone(),
            remote.clone(),
            SyncConfig::default(),
            clock.clone(),
        );
        Harness {
            store,
            remote,
            clock,
            remote_clock,
            coordinator,
        }
    }

    pub fn start(&self, keys: &[&str]) -> SyncHandle {
        self.coordinator
            .start_sync(SyncOptions::new(NS, USER, keys.iter().copied()))
            .unwrap()
    }

    pub fn events(&self) -> broadcast::Receiver<SyncEvent> {
        self.coordinator.subscribe_events()
    }

    pub fn document(&self) -> Option<RemoteDocument> {
        self.remote.document(&path())
    }

    pub fn remote_record(&self, key: &str) -> Option<RemoteRecord> {
        self.document()?.record(key).map(|r| r.unwrap())
    }

    pub fn local(&self, key: &str) -> Option<String> {
        use kvs_core::LocalStore;
        self.store.get(key).unwrap()
    }

    /// Keys recorded in the store's outbox for the test namespace.
    pub fn outbox_keys(&self) -> Vec<String> {
        use kvs_core::LocalStore;
        self.store.outbox(&path()).unwrap().into_iter().map(|(key, _)| key).collect()
    }

    /// Stores records as if another device committed them.
    pub fn seed_remote(&self, records: &[(&str, RemoteRecord)]) {
        let mut doc = self.document().unwrap_or_default();
        for (key, record) in records {
            doc.put_record(key, record).unwrap();
        }
        self.remote.put_document(&path(), doc);
    }
}

pub fn path() -> String {
    document_path(USER, NS)
}

/// A live remote record stamped at `updated_at`.
pub fn record(value: &str, rev: u64, updated_at: u64) -> RemoteRecord {
    RemoteRecord::live(
        &SyncValue::from_raw(value),
        rev,
        kvs_core::Timestamp::Millis(updated_at),
    )
}

/// Lets spawned tasks run, advancing paused time by `ms`.
pub async fn run_for(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

/// Collects events received so far.
pub fn drain(events: &mut broadcast::Receiver<SyncEvent>) -> Vec<SyncEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

/// One namespace and its shared handles, without a coordinator or tasks.
pub struct Fixture {
    pub ns: Arc<crate::namespace::Namespace>,
    pub shared: Arc<crate::namespace::Shared>,
    pub store: Arc<MemoryStore>,
    pub remote: Arc<MemoryRemote>,
    pub clock: Arc<ManualClock>,
    pub signals: Option<tokio::sync::mpsc::UnboundedReceiver<crate::queue::FlushSignal>>,
    pub events: broadcast::Receiver<SyncEvent>,
}

impl Fixture {
    pub fn new(keys: &[&str]) -> Self {
        Self::with_store(MemoryStore::new(), keys)
    }

    pub fn with_store(store: MemoryStore, keys: &[&str]) -> Self {
        let clock = Arc::new(ManualClock::new(START_MS));
        let store = Arc::new(store);
        let remote = Arc::new(MemoryRemote::with_clock(clock.clone()));
        let bus = crate::events::EventBus::new();
        let events = bus.subscribe();
        let shared = Arc::new(crate::namespace::Shared {
            store: store.clone(),
            remote: remote.clone(),
            clock: clock.clone(),
            config: SyncConfig::default(),
            events: bus,
        });
        let (ns, signals) =
            crate::namespace::Namespace::new(NS, USER, keys.iter().map(|k| k.to_string()));
        Fixture {
            ns,
            shared,
            store,
            remote,
            clock,
            signals: Some(signals),
            events,
        }
    }

    /// Spawns the namespace's debouncer.
    pub fn spawn_debouncer(&mut self) {
        let signals = self.signals.take().unwrap();
        tokio::spawn(crate::queue::run_debouncer(
            self.ns.clone(),
            self.shared.clone(),
            signals,
        ));
    }

    /// Queues a local write the way interception does.
    pub fn queue_write(&self, key: &str, value: Option<&str>) {
        let mut state = self.ns.lock();
        let state = &mut *state;
        let write = state.queue.enqueue(
            &mut state.tracker,
            key,
            value.map(SyncValue::from_raw),
            self.clock.now_ms(),
        );
        self.ns.save_outbox(self.store.as_ref(), key, write.as_ref());
    }

    /// Keys recorded in the store's outbox for this namespace.
    pub fn outbox_keys(&self) -> Vec<String> {
        use kvs_core::LocalStore;
        self.store.outbox(&path()).unwrap().into_iter().map(|(key, _)| key).collect()
    }

    pub fn local(&self, key: &str) -> Option<String> {
        use kvs_core::LocalStore;
        self.store.get(key).unwrap()
    }

    pub fn remote_record(&self, key: &str) -> Option<RemoteRecord> {
        self.remote.document(&path())?.record(key).map(|r| r.unwrap())
    }

    pub fn seed_remote(&self, records: &[(&str, RemoteRecord)]) {
        let mut doc = self.remote.document(&path()).unwrap_or_default();
        for (key, record) in records {
            doc.put_record(key, record).unwrap();
        }
        self.remote.put_document(&path(), doc);
    }
}

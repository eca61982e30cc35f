// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use crate::test_helpers::*;
use kvs_core::TOMBSTONE_HASH;
use serde_json::json;

#[test]
fn enqueue_bumps_revision_and_collapses() {
    let mut queue = WriteQueue::new();
    let mut tracker = KeyRevisionTracker::new();

    let first = queue
        .enqueue(&mut tracker, "k", Some(SyncValue::text("a")), 1000)
        .unwrap();
    assert_eq!(first.revision, 1);
    let second = queue
        .enqueue(&mut tracker, "k", Some(SyncValue::text("b")), 2000)
        .unwrap();
    assert_eq!(second.revision, 2);

    assert_eq!(queue.len(), 1);
    assert_eq!(queue.get("k").unwrap().value, Some(SyncValue::text("b")));
    assert_eq!(tracker.get("k").unwrap().content_hash, second.hash);
}

#[test]
fn enqueue_deletion_is_tombstone() {
    let mut queue = WriteQueue::new();
    let mut tracker = KeyRevisionTracker::new();

    let write = queue.enqueue(&mut tracker, "k", None, 1000).unwrap();
    assert!(write.deleted);
    assert_eq!(write.hash, TOMBSTONE_HASH);
}

#[test]
fn enqueue_at_max_revision_queues_nothing() {
    let mut queue = WriteQueue::new();
    let mut tracker = KeyRevisionTracker::new();
    tracker.set(
        "k",
        kvs_core::KeyRevision {
            revision: u64::MAX,
            updated_at: 1,
            content_hash: "h".into(),
        },
    );

    assert!(queue
        .enqueue(&mut tracker, "k", Some(SyncValue::text("a")), 2)
        .is_none());
    assert!(queue.is_empty());
    assert_eq!(tracker.get("k").unwrap().revision, u64::MAX);
}

#[test]
fn take_all_empties_queue() {
    let mut queue = WriteQueue::new();
    let mut tracker = KeyRevisionTracker::new();
    queue.enqueue(&mut tracker, "a", Some(SyncValue::text("1")), 1);
    queue.enqueue(&mut tracker, "b", Some(SyncValue::text("2")), 1);

    let batch = queue.take_all();
    assert_eq!(batch.len(), 2);
    assert!(queue.is_empty());
}

#[test]
fn requeue_keeps_newer_writes() {
    let mut queue = WriteQueue::new();
    let mut tracker = KeyRevisionTracker::new();
    queue.enqueue(&mut tracker, "a", Some(SyncValue::text("old")), 1);
    queue.enqueue(&mut tracker, "b", Some(SyncValue::text("b")), 1);
    let batch = queue.take_all();

    // "a" is written again while the batch is in flight
    queue.enqueue(&mut tracker, "a", Some(SyncValue::text("new")), 2);
    queue.requeue(batch);

    assert_eq!(queue.len(), 2);
    assert_eq!(queue.get("a").unwrap().value, Some(SyncValue::text("new")));
    assert_eq!(queue.get("a").unwrap().revision, 2);
    assert!(queue.contains("b"));
}

#[tokio::test(start_paused = true)]
async fn debouncer_waits_for_quiet_period() {
    let mut fx = Fixture::new(&["k"]);
    fx.spawn_debouncer();

    for (i, value) in ["1", "2", "3", "4", "5"].iter().enumerate() {
        fx.queue_write("k", Some(value));
        fx.ns.signal(FlushSignal::Write);
        run_for(if i < 4 { 250 } else { 0 }).await;
    }
    // 1000ms have passed, but never 300ms without a write
    assert_eq!(fx.remote.commit_count(), 0);

    run_for(310).await;
    assert_eq!(fx.remote.commit_count(), 1);
    let record = fx.remote_record("k").unwrap();
    assert_eq!(record.value, json!(5));
    assert_eq!(record.rev, 5);
}

#[tokio::test(start_paused = true)]
async fn explicit_flush_reports_outcome() {
    let mut fx = Fixture::new(&["k"]);
    fx.spawn_debouncer();
    fx.queue_write("k", Some("v"));

    let (tx, rx) = oneshot::channel();
    fx.ns.signal(FlushSignal::Now(Some(tx)));
    let outcome = rx.await.unwrap();

    assert!(matches!(outcome, FlushOutcome::Committed { keys: 1, version: 1 }));
}

#[tokio::test(start_paused = true)]
async fn writes_during_flush_start_a_new_window() {
    let mut fx = Fixture::new(&["a", "b"]);
    fx.spawn_debouncer();

    fx.queue_write("a", Some("1"));
    fx.ns.signal(FlushSignal::Write);
    run_for(310).await;
    assert_eq!(fx.remote.commit_count(), 1);

    fx.queue_write("b", Some("2"));
    fx.ns.signal(FlushSignal::Write);
    run_for(299).await;
    assert_eq!(fx.remote.commit_count(), 1);
    run_for(2).await;
    assert_eq!(fx.remote.commit_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn debouncer_stops_on_cancel() {
    let mut fx = Fixture::new(&["k"]);
    fx.spawn_debouncer();
    fx.queue_write("k", Some("v"));
    fx.ns.signal(FlushSignal::Write);

    fx.ns.cancel.cancel();
    run_for(1000).await;
    assert_eq!(fx.remote.commit_count(), 0);
}

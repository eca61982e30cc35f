// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! kvs-core: Shared library for the kvsync key-value synchronization engine
//!
//! This crate provides the value and record types, last-writer-wins
//! resolution, the remote document shape and wire protocol, and local store
//! implementations used by both the `kvsync` engine and the `kvs-remote`
//! relay server.

pub mod document;
pub mod error;
pub mod merge;
pub mod protocol;
pub mod record;
pub mod stamp;
pub mod store;
pub mod value;

pub use document::{apply_commit, document_path, path_owner, DocumentMeta, RemoteDocument};
pub use error::{Error, Result};
pub use merge::{applied_revision, resolve, should_apply, Resolution};
pub use record::{KeyRevision, PendingWrite, RemoteRecord, ServerValue, Timestamp};
pub use stamp::{ClockSource, ManualClock, Stamp, SystemClock};
pub use store::{LocalStore, MemoryStore, OutboxEntry, SqliteStore};
pub use value::{content_hash, raw_content_hash, Scalar, SyncValue, TOMBSTONE_HASH};

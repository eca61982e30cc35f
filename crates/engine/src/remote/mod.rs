// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Remote document stores.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌─────────────┐
//! │   Engine    │────►│ RemoteStore  │────►│  kvs-remote │
//! │ (flush/sub) │◄────│   (trait)    │◄────│    relay    │
//! └─────────────┘     └──────────────┘     └─────────────┘
//! ```
//!
//! - [`WebSocketRemote`] talks to a `kvs-remote` relay
//! - [`MemoryRemote`] keeps documents in-process, for tests and embedding
//!
//! Writes are compare-and-swap on the document's sync version; [`transact`]
//! wraps the read-modify-commit cycle.

mod memory;
mod websocket;

pub use memory::MemoryRemote;
pub use websocket::{TransportError, WebSocketRemote};

use std::future::Future;
use std::pin::Pin;

use kvs_core::{RemoteDocument, Timestamp};
use tokio::sync::mpsc;

pub use crate::error::{RemoteError, RemoteResult};

/// Boxed future returned by [`RemoteStore`] methods.
pub type RemoteFuture<'a, T> = Pin<Box<dyn Future<Output = RemoteResult<T>> + Send + 'a>>;

/// One delivery on a subscription: the current document, or a failure
/// that ends the subscription.
pub type DocumentEvent = RemoteResult<Option<RemoteDocument>>;

/// A live stream of document snapshots for one path.
///
/// The current document is delivered first, then again after every commit.
/// Dropping the subscription unsubscribes.
pub struct Subscription {
    events: mpsc::UnboundedReceiver<DocumentEvent>,
    on_drop: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(events: mpsc::UnboundedReceiver<DocumentEvent>) -> Self {
        Subscription {
            events,
            on_drop: None,
        }
    }

    /// Runs `f` when the subscription is dropped.
    pub fn on_drop(mut self, f: impl FnOnce() + Send + 'static) -> Self {
        self.on_drop = Some(Box::new(f));
        self
    }

    /// Waits for the next delivery. `None` means the stream ended.
    pub async fn next(&mut self) -> Option<DocumentEvent> {
        self.events.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(f) = self.on_drop.take() {
            f();
        }
    }
}

/// A remote document database.
pub trait RemoteStore: Send + Sync {
    /// Reads the document at `path`. `None` if it was never written.
    fn get_snapshot<'a>(&'a self, path: &'a str) -> RemoteFuture<'a, Option<RemoteDocument>>;

    /// Subscribes to the document at `path`.
    fn subscribe<'a>(&'a self, path: &'a str) -> RemoteFuture<'a, Subscription>;

    /// Replaces the document if its sync version still equals
    /// `expected_version`. Returns the committed version.
    ///
    /// A version mismatch fails with [`RemoteError::FailedPrecondition`].
    fn commit<'a>(
        &'a self,
        path: &'a str,
        expected_version: u64,
        document: RemoteDocument,
    ) -> RemoteFuture<'a, u64>;

    /// The value to store in timestamp fields so the server fills in its
    /// own clock at commit.
    fn server_timestamp(&self) -> Timestamp {
        Timestamp::server()
    }
}

/// Reads the document at `path`, lets `mutate` edit it, and commits the
/// result against the version that was read.
///
/// A concurrent writer makes the commit fail with
/// [`RemoteError::FailedPrecondition`]; callers retry the whole cycle.
pub async fn transact<F>(
    remote: &dyn RemoteStore,
    path: &str,
    mutate: F,
) -> RemoteResult<RemoteDocument>
where
    F: FnOnce(&mut RemoteDocument) -> RemoteResult<()>,
{
    let current = remote.get_snapshot(path).await?;
    let expected = current.as_ref().map(RemoteDocument::version).unwrap_or(0);
    let mut next = current.unwrap_or_default();
    mutate(&mut next)?;
    let version = remote.commit(path, expected, next.clone()).await?;
    next.meta.sync_version = version;
    Ok(next)
}

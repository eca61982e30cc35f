// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Server state management.
//!
//! Holds the canonical documents, applies commits and fans changes out to
//! connections. With a data directory, documents survive restarts.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info};

use kvs_core::protocol::ServerMessage;
use kvs_core::{apply_commit, ClockSource, RemoteDocument, Result, SystemClock};

/// File the documents are persisted to inside the data directory.
pub const DOCUMENTS_FILE: &str = "documents.json";

/// Shared server state containing the canonical documents.
#[derive(Clone)]
pub struct ServerState {
    inner: Arc<ServerStateInner>,
}

struct ServerStateInner {
    documents: Mutex<BTreeMap<String, RemoteDocument>>,
    /// Broadcast channel of `Change` messages for every accepted commit.
    broadcast_tx: broadcast::Sender<ServerMessage>,
    /// Where documents are persisted, if anywhere.
    data_file: Option<PathBuf>,
    clock: Arc<dyn ClockSource>,
}

impl ServerState {
    /// Creates state that lives only as long as the process.
    pub fn in_memory() -> Self {
        Self::build(BTreeMap::new(), None, Arc::new(SystemClock))
    }

    /// Opens state persisted in `data_dir`, loading any saved documents.
    pub fn open(data_dir: &Path) -> Result<Self> {
        Self::new(Some(data_dir), Arc::new(SystemClock))
    }

    /// Creates state whose server timestamps come from `clock`, persisted in
    /// `data_dir` when one is given.
    pub fn new(data_dir: Option<&Path>, clock: Arc<dyn ClockSource>) -> Result<Self> {
        let Some(data_dir) = data_dir else {
            return Ok(Self::build(BTreeMap::new(), None, clock));
        };
        std::fs::create_dir_all(data_dir)?;
        let data_file = data_dir.join(DOCUMENTS_FILE);
        let documents: BTreeMap<String, RemoteDocument> = if data_file.exists() {
            let text = std::fs::read_to_string(&data_file)?;
            serde_json::from_str(&text)?
        } else {
            BTreeMap::new()
        };
        info!(
            "Loaded {} documents from {}",
            documents.len(),
            data_file.display()
        );
        Ok(Self::build(documents, Some(data_file), clock))
    }

    fn build(
        documents: BTreeMap<String, RemoteDocument>,
        data_file: Option<PathBuf>,
        clock: Arc<dyn ClockSource>,
    ) -> Self {
        let (broadcast_tx, _) = broadcast::channel(1024);
        ServerState {
            inner: Arc::new(ServerStateInner {
                documents: Mutex::new(documents),
                broadcast_tx,
                data_file,
                clock,
            }),
        }
    }

    /// Returns the document at `path`, if it was ever written.
    pub async fn get(&self, path: &str) -> Option<RemoteDocument> {
        self.inner.documents.lock().await.get(path).cloned()
    }

    /// Applies a compare-and-swap commit, persists and broadcasts it.
    ///
    /// Returns the new sync version.
    pub async fn commit(
        &self,
        path: &str,
        expected_version: u64,
        document: RemoteDocument,
    ) -> Result<u64> {
        let mut documents = self.inner.documents.lock().await;
        let committed = apply_commit(
            documents.get(path),
            expected_version,
            document,
            self.inner.clock.now_ms(),
        )?;
        let version = committed.version();

        let previous = documents.insert(path.to_string(), committed.clone());
        if let Err(e) = self.persist(&documents) {
            match previous {
                Some(doc) => documents.insert(path.to_string(), doc),
                None => documents.remove(path),
            };
            return Err(e);
        }
        debug!(path, version, "commit accepted");

        // No receivers is fine
        let _ = self
            .inner
            .broadcast_tx
            .send(ServerMessage::change(path, Some(committed)));
        Ok(version)
    }

    /// Writes all documents to the data file via a temp file and rename.
    fn persist(&self, documents: &BTreeMap<String, RemoteDocument>) -> Result<()> {
        let Some(data_file) = &self.inner.data_file else {
            return Ok(());
        };
        let json = serde_json::to_string_pretty(documents)?;
        let tmp = data_file.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, data_file)?;
        Ok(())
    }

    /// Number of stored documents.
    pub async fn len(&self) -> usize {
        self.inner.documents.lock().await.len()
    }

    /// True when no document was ever written.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Subscribe to broadcast messages.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerMessage> {
        self.inner.broadcast_tx.subscribe()
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;

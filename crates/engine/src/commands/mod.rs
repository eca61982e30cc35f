// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

pub mod kv;
pub mod status;
pub mod sync;
pub mod watch;

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use kvs_core::{LocalStore, SqliteStore, SystemClock};
use tracing::debug;

use crate::config::{find_config, Config, NamespaceConfig};
use crate::coordinator::{SyncCoordinator, SyncOptions};
use crate::error::{Error, Result};
use crate::remote::{RemoteStore, WebSocketRemote};

/// Whether commands reach a remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatingMode {
    /// No `[remote]` section: the local store only.
    Local,
    /// A remote is configured and a user is signed in.
    Remote { url: String, user: String },
    /// A remote is configured but nobody is signed in.
    SignedOut { url: String },
}

impl OperatingMode {
    pub fn detect(config: &Config) -> Self {
        match (&config.remote, &config.user) {
            (None, _) => OperatingMode::Local,
            (Some(remote), Some(user)) => OperatingMode::Remote {
                url: remote.url.clone(),
                user: user.clone(),
            },
            (Some(remote), None) => OperatingMode::SignedOut {
                url: remote.url.clone(),
            },
        }
    }
}

impl std::fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperatingMode::Local => write!(f, "local"),
            OperatingMode::Remote { .. } => write!(f, "remote"),
            OperatingMode::SignedOut { .. } => write!(f, "remote (signed out)"),
        }
    }
}

/// The config file and the local store it names.
pub struct Workspace {
    pub config: Config,
    pub config_path: PathBuf,
    pub store: Arc<dyn LocalStore>,
}

impl Workspace {
    /// Loads the config (from `explicit`, or found upward from the current
    /// directory) and opens its store.
    pub fn open(explicit: Option<&Path>) -> Result<Self> {
        let config_path = match explicit {
            Some(path) => path.to_path_buf(),
            None => find_config(&std::env::current_dir()?)?,
        };
        let config = Config::load(&config_path)?;
        let store_path = config.store_path(&config_path);
        debug!(config = %config_path.display(), store = %store_path.display(), "opening workspace");
        let store = SqliteStore::open(&store_path)?;
        Ok(Workspace {
            config,
            config_path,
            store: Arc::new(store),
        })
    }

    pub fn mode(&self) -> OperatingMode {
        OperatingMode::detect(&self.config)
    }

    /// The remote client and user, or `NoUser` when signed out.
    ///
    /// `None` in local mode.
    pub fn remote(&self) -> Result<Option<(Arc<dyn RemoteStore>, String)>> {
        let Some(remote) = &self.config.remote else {
            return Ok(None);
        };
        let user = self.config.user.clone().ok_or(Error::NoUser)?;
        let client =
            WebSocketRemote::with_timeout(remote.url.clone(), user.clone(), remote.request_timeout());
        Ok(Some((Arc::new(client), user)))
    }

    /// A coordinator over this workspace's store and `remote`.
    pub fn coordinator(&self, remote: Arc<dyn RemoteStore>) -> SyncCoordinator {
        let mut sync = self.config.sync.clone();
        // Nothing else writes while the CLI starts up
        sync.reconcile_delay_ms = 0;
        SyncCoordinator::with_options(self.store.clone(), remote, sync, Arc::new(SystemClock))
    }

    /// Starts syncing each of `namespaces` as `user`.
    pub fn start_all<'a>(
        &self,
        coordinator: &SyncCoordinator,
        user: &str,
        namespaces: impl IntoIterator<Item = &'a NamespaceConfig>,
    ) -> Result<Vec<String>> {
        let mut started = Vec::new();
        for ns in namespaces {
            coordinator.start_sync(SyncOptions::new(&ns.name, user, ns.keys.iter().cloned()))?;
            started.push(ns.name.clone());
        }
        Ok(started)
    }
}

/// Runs `future` on a fresh multi-threaded runtime.
pub fn block_on<F: Future>(future: F) -> Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    Ok(runtime.block_on(future))
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;

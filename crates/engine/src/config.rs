// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Engine tuning and the `kvsync.toml` configuration file.
//!
//! The file names the local store, the signed-in user, an optional remote,
//! and the namespaces to sync:
//!
//! ```toml
//! store = "local.db"
//! user = "alice"
//!
//! [remote]
//! url = "ws://localhost:7890"
//!
//! [sync]
//! debounce_ms = 300
//!
//! [[namespace]]
//! name = "app"
//! keys = ["theme", "font_size"]
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Default config file name, searched for from the working directory upward.
pub const CONFIG_FILE_NAME: &str = "kvsync.toml";

const DEFAULT_STORE_NAME: &str = "kvsync.db";

/// Timing knobs for the sync engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Quiet period after the last local write before flushing.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Base delay for flush and subscription retries.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Consecutive failures tolerated before auto-retry stops.
    #[serde(default = "default_max_retry_attempts")]
    pub max_retry_attempts: u32,
    /// Upper bound on any single backoff delay.
    #[serde(default = "default_max_retry_delay_ms")]
    pub max_retry_delay_ms: u64,
    /// How long a key ignores local interception after a remote apply.
    #[serde(default = "default_sync_lock_grace_ms")]
    pub sync_lock_grace_ms: u64,
    /// Delay between starting a namespace and reconciling it.
    #[serde(default = "default_reconcile_delay_ms")]
    pub reconcile_delay_ms: u64,
}

fn default_debounce_ms() -> u64 {
    300
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_max_retry_attempts() -> u32 {
    3
}

fn default_max_retry_delay_ms() -> u64 {
    30_000
}

fn default_sync_lock_grace_ms() -> u64 {
    100
}

fn default_reconcile_delay_ms() -> u64 {
    500
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            debounce_ms: default_debounce_ms(),
            retry_delay_ms: default_retry_delay_ms(),
            max_retry_attempts: default_max_retry_attempts(),
            max_retry_delay_ms: default_max_retry_delay_ms(),
            sync_lock_grace_ms: default_sync_lock_grace_ms(),
            reconcile_delay_ms: default_reconcile_delay_ms(),
        }
    }
}

impl SyncConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn sync_lock_grace(&self) -> Duration {
        Duration::from_millis(self.sync_lock_grace_ms)
    }

    pub fn reconcile_delay(&self) -> Duration {
        Duration::from_millis(self.reconcile_delay_ms)
    }

    /// Delay before retry number `attempt` (1-based): `retry_delay × 2^(attempt-1)`,
    /// capped at `max_retry_delay_ms`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let delay = self.retry_delay_ms.saturating_mul(1u64 << exponent);
        Duration::from_millis(delay.min(self.max_retry_delay_ms))
    }
}

/// Remote store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// WebSocket URL of the relay (`ws://` or `wss://`).
    pub url: String,
    /// Max time to wait for a connection or a reply, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout_secs() -> u64 {
    10
}

impl RemoteConfig {
    /// Returns an error message if the URL is not a WebSocket URL.
    pub fn validate_url(&self) -> Option<String> {
        if self.url.starts_with("ws://") || self.url.starts_with("wss://") {
            None
        } else {
            Some(format!(
                "invalid remote URL '{}': must be ws:// or wss://",
                self.url
            ))
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// A namespace and the keys it tracks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceConfig {
    pub name: String,
    #[serde(default)]
    pub keys: Vec<String>,
}

/// Contents of `kvsync.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path of the SQLite store, relative to the config file.
    #[serde(default = "default_store")]
    pub store: String,
    /// Signed-in user. Sync needs one; local commands do not.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Remote sync configuration (if absent, runs in local-only mode).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<RemoteConfig>,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default, rename = "namespace")]
    pub namespaces: Vec<NamespaceConfig>,
}

fn default_store() -> String {
    DEFAULT_STORE_NAME.to_string()
}

impl Config {
    /// Parses a config and checks it for mistakes serde cannot catch.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {}", path.display(), e)))?;
        Self::parse(&content)
    }

    fn validate(&self) -> Result<()> {
        if let Some(remote) = &self.remote {
            if let Some(msg) = remote.validate_url() {
                return Err(Error::Config(msg));
            }
        }
        let mut seen = std::collections::HashSet::new();
        for ns in &self.namespaces {
            if ns.name.is_empty() || ns.name.contains('/') {
                return Err(Error::Config(format!(
                    "invalid namespace name '{}': must be non-empty without '/'",
                    ns.name
                )));
            }
            if !seen.insert(ns.name.as_str()) {
                return Err(Error::Config(format!("duplicate namespace '{}'", ns.name)));
            }
        }
        Ok(())
    }

    /// Returns true if remote sync is configured.
    pub fn is_remote_mode(&self) -> bool {
        self.remote.is_some()
    }

    /// Resolves the store path against the directory holding the config file.
    pub fn store_path(&self, config_path: &Path) -> PathBuf {
        let store = Path::new(&self.store);
        if store.is_absolute() {
            store.to_path_buf()
        } else {
            config_path
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join(store)
        }
    }

    /// Namespaces whose key set includes `key`.
    pub fn namespaces_tracking(&self, key: &str) -> Vec<&NamespaceConfig> {
        self.namespaces
            .iter()
            .filter(|ns| ns.keys.iter().any(|k| k == key))
            .collect()
    }
}

/// Finds `kvsync.toml` by walking up from `start`, falling back to the
/// user config directory.
pub fn find_config(start: &Path) -> Result<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        let candidate = current.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            return Ok(candidate);
        }
        if !current.pop() {
            break;
        }
    }
    if let Some(candidate) = dirs::config_dir().map(|d| d.join("kvsync").join(CONFIG_FILE_NAME)) {
        if candidate.is_file() {
            return Ok(candidate);
        }
    }
    Err(Error::Config(format!(
        "no {} found\n  hint: create one or pass --config",
        CONFIG_FILE_NAME
    )))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

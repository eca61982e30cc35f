// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! kvsync: keeps selected keys of a local key-value store in sync with a
//! per-user remote document.
//!
//! Hosts build a [`SyncCoordinator`] over a [`LocalStore`](kvs_core::LocalStore)
//! and a [`RemoteStore`](remote::RemoteStore), start namespaces with
//! [`SyncOptions`], and write through [`InterceptedStore`]. Local writes are
//! debounced and committed in batches; remote changes are applied with
//! last-writer-wins ordering and announced as [`SyncEvent`]s.

pub mod cli;
mod commands;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod flusher;
pub mod identity;
pub mod interceptor;
mod namespace;
pub mod queue;
pub mod reconciler;
pub mod remote;
mod subscriber;
pub mod tracker;

pub use cli::{Cli, Command, OutputFormat};
pub use config::{Config, NamespaceConfig, RemoteConfig, SyncConfig};
pub use coordinator::{SyncCoordinator, SyncHandle, SyncOptions};
pub use error::{Error, ErrorKind, RemoteError, Result};
pub use events::{ChangeEvent, ChangeSource, EventBus, SyncEvent};
pub use flusher::FlushOutcome;
pub use identity::{IdentityProvider, SessionIdentity};
pub use interceptor::{InterceptedStore, Interception};
pub use namespace::{BackendKind, SyncStatus};
pub use reconciler::{ReconcileReport, ReconcileState};
pub use remote::{MemoryRemote, RemoteStore, WebSocketRemote};

/// Runs one CLI command.
pub fn run(cli: Cli) -> Result<()> {
    let config = cli.config.as_deref();
    match cli.command {
        Command::Get { key } => commands::kv::get(config, &key),
        Command::Set { key, value } => commands::kv::set(config, &key, &value),
        Command::Delete { key } => commands::kv::delete(config, &key),
        Command::Keys => commands::kv::keys(config),
        Command::Sync { output } => commands::sync::run(config, output),
        Command::Watch => commands::watch::run(config),
        Command::Status { output } => commands::status::run(config, output),
    }
}

#[cfg(test)]
mod test_helpers;

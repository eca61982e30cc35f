// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Reading and writing keys.
//!
//! Writes to a key that some namespace tracks are synced before the command
//! returns. If the sync fails the write stays in the local store's outbox
//! and the next command that starts the namespace, such as `kvsync sync`,
//! sends it.

use std::path::Path;

use tracing::{info, warn};

use super::{block_on, Workspace};
use crate::error::{Error, Result};
use crate::flusher::FlushOutcome;

pub fn get(config: Option<&Path>, key: &str) -> Result<()> {
    let ws = Workspace::open(config)?;
    let value = ws
        .store
        .get(key)?
        .ok_or_else(|| Error::KeyNotFound(key.to_string()))?;
    println!("{}", value);
    Ok(())
}

pub fn keys(config: Option<&Path>) -> Result<()> {
    let ws = Workspace::open(config)?;
    for key in ws.store.keys()? {
        println!("{}", key);
    }
    Ok(())
}

pub fn set(config: Option<&Path>, key: &str, value: &str) -> Result<()> {
    write(config, key, Some(value))
}

pub fn delete(config: Option<&Path>, key: &str) -> Result<()> {
    let ws = Workspace::open(config)?;
    if ws.store.get(key)?.is_none() {
        return Err(Error::KeyNotFound(key.to_string()));
    }
    write_in(&ws, key, None)
}

fn write(config: Option<&Path>, key: &str, value: Option<&str>) -> Result<()> {
    let ws = Workspace::open(config)?;
    write_in(&ws, key, value)
}

fn write_in(ws: &Workspace, key: &str, value: Option<&str>) -> Result<()> {
    let tracking = ws.config.namespaces_tracking(key);
    let remote = if tracking.is_empty() {
        None
    } else {
        match ws.remote() {
            Ok(remote) => remote,
            Err(Error::NoUser) => {
                warn!("no user is signed in; '{}' stays local", key);
                None
            }
            Err(e) => return Err(e),
        }
    };

    let Some((remote, user)) = remote else {
        match value {
            Some(value) => ws.store.raw_set(key, value)?,
            None => ws.store.raw_delete(key)?,
        }
        return Ok(());
    };

    block_on(async {
        let coordinator = ws.coordinator(remote);
        let started = ws.start_all(&coordinator, &user, tracking)?;

        // Settle with the remote first so the write carries the latest revision
        for namespace in &started {
            if let Err(e) = coordinator.reconciled(namespace).await {
                warn!(namespace = %namespace, "{}", e);
            }
        }

        let store = coordinator.store();
        match value {
            Some(value) => store.set(key, value)?,
            None => store.delete(key)?,
        }

        for namespace in &started {
            match coordinator.flush_now(namespace).await? {
                FlushOutcome::Committed { version, .. } => {
                    info!(namespace = %namespace, version, "synced {}", key);
                }
                FlushOutcome::Failed { message, .. } => {
                    warn!(namespace = %namespace, "saved locally; sync failed: {}", message);
                }
                FlushOutcome::Inactive | FlushOutcome::Cancelled => {
                    warn!(namespace = %namespace, "saved locally; sync is not running");
                }
                FlushOutcome::Idle => {}
            }
        }

        coordinator.stop_all();
        Ok::<_, Error>(())
    })?
}

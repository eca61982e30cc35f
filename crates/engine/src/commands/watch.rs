// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Long-running sync that prints remote changes until Ctrl-C.

use std::path::Path;

use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use super::{block_on, Workspace};
use crate::error::{Error, Result};
use crate::events::{ChangeEvent, SyncEvent};

pub fn run(config: Option<&Path>) -> Result<()> {
    let ws = Workspace::open(config)?;
    let Some((remote, user)) = ws.remote()? else {
        return Err(Error::Config(
            "no remote configured\n  hint: add a [remote] section with a url".to_string(),
        ));
    };
    if ws.config.namespaces.is_empty() {
        return Err(Error::Config(
            "no namespaces configured\n  hint: add a [[namespace]] section".to_string(),
        ));
    }

    block_on(async {
        let coordinator = ws.coordinator(remote);
        let mut events = coordinator.subscribe_events();
        let started = ws.start_all(&coordinator, &user, &ws.config.namespaces)?;
        info!("watching {} (Ctrl-C to stop)", started.join(", "));

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                event = events.recv() => match event {
                    Ok(event) => print_event(&event),
                    Err(RecvError::Lagged(n)) => warn!("missed {} events", n),
                    Err(RecvError::Closed) => break,
                },
            }
        }

        // Push anything written locally since the last flush
        for namespace in &started {
            let _ = coordinator.flush_now(namespace).await;
        }
        coordinator.stop_all();
        Ok::<_, Error>(())
    })?
}

fn print_event(event: &SyncEvent) {
    match event {
        SyncEvent::Changed(change) => println!("{}", format_change(change)),
        SyncEvent::Flushed {
            namespace,
            keys,
            version,
        } => info!(namespace = %namespace, keys, version, "flushed"),
        SyncEvent::Error {
            namespace,
            kind,
            message,
        } => warn!(namespace = %namespace, ?kind, "{}", message),
    }
}

/// One line per change: `namespace key = value`, or `namespace key deleted`.
pub(crate) fn format_change(change: &ChangeEvent) -> String {
    match &change.value {
        Some(value) => format!("{} {} = {}", change.namespace, change.key, value.to_raw()),
        None => format!("{} {} deleted", change.namespace, change.key),
    }
}

#[cfg(test)]
#[path = "watch_tests.rs"]
mod tests;

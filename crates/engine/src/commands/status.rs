// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Read-only comparison of tracked keys against the remote.
//!
//! Nothing is started and nothing is written; the remote document is read
//! once per namespace.

use std::path::Path;

use chrono::{DateTime, Utc};
use kvs_core::stamp::millis_to_datetime;
use kvs_core::{document_path, raw_content_hash, RemoteDocument, RemoteRecord};
use serde::Serialize;

use super::{block_on, OperatingMode, Workspace};
use crate::cli::OutputFormat;
use crate::error::{RemoteResult, Result};

/// How a tracked key compares with its remote record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyState {
    /// Same content on both sides (including both deleted).
    InSync,
    /// Only the local store has a value.
    LocalOnly,
    /// Only the remote has a value.
    RemoteOnly,
    /// Both sides hold different content.
    Differs,
    /// Neither side has ever held the key.
    Absent,
    /// The remote record cannot be read.
    Malformed,
    /// The remote was not consulted.
    Unknown,
}

impl std::fmt::Display for KeyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            KeyState::InSync => "in sync",
            KeyState::LocalOnly => "local only",
            KeyState::RemoteOnly => "remote only",
            KeyState::Differs => "differs",
            KeyState::Absent => "absent",
            KeyState::Malformed => "malformed remote record",
            KeyState::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Compares a local raw value with the remote record for the same key.
pub(crate) fn compare_key(
    local: Option<&str>,
    remote: Option<kvs_core::Result<RemoteRecord>>,
) -> KeyState {
    let record = match remote {
        None => {
            return if local.is_some() {
                KeyState::LocalOnly
            } else {
                KeyState::Absent
            };
        }
        Some(Err(_)) => return KeyState::Malformed,
        Some(Ok(record)) => record,
    };

    match (local, record.deleted) {
        (None, true) => KeyState::InSync,
        (None, false) => KeyState::RemoteOnly,
        (Some(_), true) => KeyState::LocalOnly,
        (Some(raw), false) if raw_content_hash(Some(raw)) == record.hash => KeyState::InSync,
        (Some(_), false) => KeyState::Differs,
    }
}

#[derive(Debug, Serialize)]
struct KeyReport {
    key: String,
    state: KeyState,
}

#[derive(Debug, Serialize)]
struct NamespaceReport {
    namespace: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    remote_version: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_updated: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    keys: Vec<KeyReport>,
}

#[derive(Debug, Serialize)]
struct StatusReport {
    mode: String,
    config: String,
    store: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    remote: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<String>,
    local_keys: usize,
    namespaces: Vec<NamespaceReport>,
}

pub fn run(config: Option<&Path>, output: OutputFormat) -> Result<()> {
    let ws = Workspace::open(config)?;
    let mode = ws.mode();

    let mut report = StatusReport {
        mode: mode.to_string(),
        config: ws.config_path.display().to_string(),
        store: ws.config.store_path(&ws.config_path).display().to_string(),
        remote: ws.config.remote.as_ref().map(|r| r.url.clone()),
        user: ws.config.user.clone(),
        local_keys: ws.store.keys()?.len(),
        namespaces: Vec::new(),
    };

    let remote = match mode {
        OperatingMode::Remote { .. } => ws.remote()?,
        OperatingMode::Local | OperatingMode::SignedOut { .. } => None,
    };

    let fetched: Vec<Option<RemoteResult<Option<RemoteDocument>>>> = match &remote {
        Some((remote, user)) => block_on(async {
            let mut fetched = Vec::new();
            for ns in &ws.config.namespaces {
                let path = document_path(user, &ns.name);
                fetched.push(Some(remote.get_snapshot(&path).await));
            }
            fetched
        })?,
        None => ws.config.namespaces.iter().map(|_| None).collect(),
    };

    for (ns, fetched) in ws.config.namespaces.iter().zip(fetched) {
        let mut ns_report = NamespaceReport {
            namespace: ns.name.clone(),
            remote_version: None,
            last_updated: None,
            error: None,
            keys: Vec::new(),
        };
        let document: Option<RemoteDocument> = match fetched {
            Some(Ok(doc)) => {
                let doc = doc.unwrap_or_default();
                ns_report.remote_version = Some(doc.version());
                ns_report.last_updated = doc
                    .meta
                    .last_updated
                    .millis()
                    .and_then(millis_to_datetime)
                    .map(format_time);
                Some(doc)
            }
            Some(Err(e)) => {
                ns_report.error = Some(e.to_string());
                None
            }
            None => None,
        };

        for key in &ns.keys {
            let local = ws.store.get(key)?;
            let state = match &document {
                Some(doc) => compare_key(local.as_deref(), doc.record(key)),
                None => KeyState::Unknown,
            };
            ns_report.keys.push(KeyReport {
                key: key.clone(),
                state,
            });
        }
        report.namespaces.push(ns_report);
    }

    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print_text(&report),
    }
    Ok(())
}

fn format_time(dt: DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

fn print_text(report: &StatusReport) {
    println!("Mode: {}", report.mode);
    println!("Config: {}", report.config);
    println!("Store: {} ({} keys)", report.store, report.local_keys);
    if let Some(remote) = &report.remote {
        println!("Remote: {}", remote);
    }
    if let Some(user) = &report.user {
        println!("User: {}", user);
    }
    if report.namespaces.is_empty() {
        println!();
        println!("No namespaces configured.");
        return;
    }
    for ns in &report.namespaces {
        println!();
        match (&ns.remote_version, &ns.error) {
            (Some(version), _) => {
                print!("{} (version {}", ns.namespace, version);
                if let Some(updated) = &ns.last_updated {
                    print!(", updated {}", updated);
                }
                println!(")");
            }
            (None, Some(err)) => println!("{} (remote unavailable: {})", ns.namespace, err),
            (None, None) => println!("{}", ns.namespace),
        }
        for key in &ns.keys {
            if key.state == KeyState::Unknown {
                println!("  {}", key.key);
            } else {
                println!("  {}: {}", key.key, key.state);
            }
        }
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;

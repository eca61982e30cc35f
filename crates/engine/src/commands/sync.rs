// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! One-shot sync of every configured namespace.

use std::path::Path;

use serde::Serialize;

use super::{block_on, Workspace};
use crate::cli::OutputFormat;
use crate::error::{Error, Result};
use crate::flusher::FlushOutcome;
use crate::namespace::SyncStatus;
use crate::reconciler::ReconcileReport;

#[derive(Debug, Serialize)]
struct NamespaceSync {
    namespace: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    reconcile: Option<ReconcileReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reconcile_error: Option<String>,
    flush: FlushOutcome,
    status: Option<SyncStatus>,
}

impl NamespaceSync {
    fn succeeded(&self) -> bool {
        self.reconcile_error.is_none()
            && matches!(
                self.flush,
                FlushOutcome::Committed { .. } | FlushOutcome::Idle
            )
    }
}

pub fn run(config: Option<&Path>, output: OutputFormat) -> Result<()> {
    let ws = Workspace::open(config)?;
    let Some((remote, user)) = ws.remote()? else {
        return Err(Error::Config(
            "no remote configured\n  hint: add a [remote] section with a url".to_string(),
        ));
    };
    if ws.config.namespaces.is_empty() {
        println!("No namespaces configured.");
        return Ok(());
    }

    let results = block_on(async {
        let coordinator = ws.coordinator(remote);
        let started = ws.start_all(&coordinator, &user, &ws.config.namespaces)?;

        let mut results = Vec::new();
        for namespace in started {
            let (reconcile, reconcile_error) = match coordinator.reconciled(&namespace).await {
                Ok(report) => (Some(report), None),
                Err(e) => (None, Some(e.to_string())),
            };
            let flush = coordinator.flush_now(&namespace).await?;
            let status = coordinator.sync_status(&namespace);
            results.push(NamespaceSync {
                namespace,
                reconcile,
                reconcile_error,
                flush,
                status,
            });
        }

        coordinator.stop_all();
        Ok::<_, Error>(results)
    })??;

    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&results)?),
        OutputFormat::Text => {
            for result in &results {
                print_text(result);
            }
        }
    }

    let failed: Vec<_> = results
        .iter()
        .filter(|r| !r.succeeded())
        .map(|r| r.namespace.as_str())
        .collect();
    if failed.is_empty() {
        Ok(())
    } else {
        Err(Error::SyncIncomplete(failed.join(", ")))
    }
}

fn print_text(result: &NamespaceSync) {
    println!("{}:", result.namespace);
    match (&result.reconcile, &result.reconcile_error) {
        (Some(report), _) => println!(
            "  reconciled: {} uploaded, {} downloaded, {} deleted, {} unchanged, {} skipped",
            report.uploaded, report.downloaded, report.deleted, report.unchanged, report.skipped
        ),
        (None, Some(err)) => println!("  reconcile failed: {}", err),
        (None, None) => {}
    }
    match &result.flush {
        FlushOutcome::Committed { keys, version } => {
            println!("  flushed: {} keys (version {})", keys, version)
        }
        FlushOutcome::Idle => println!("  flushed: nothing pending"),
        FlushOutcome::Failed {
            message, attempts, ..
        } => println!("  flush failed after {} attempts: {}", attempts, message),
        FlushOutcome::Inactive | FlushOutcome::Cancelled => println!("  flush: sync not running"),
    }
    if let Some(status) = &result.status {
        if let Some(err) = &status.last_error {
            println!("  last error: {}", err);
        }
    }
}

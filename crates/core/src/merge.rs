// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Last-writer-wins conflict resolution for incoming remote records.
//!
//! Merge rules:
//! - No local bookkeeping for the key: apply
//! - Remote written earlier than local: discard
//! - Same write time: apply only if the remote revision is higher
//! - Remote written later: apply, whatever the revisions
//!
//! Resolution is a pure function of the two stamps; arrival order plays no
//! part.

use crate::record::{KeyRevision, RemoteRecord};

/// Outcome of comparing a remote record against local bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The key has never been written or applied locally.
    NoLocalState,
    /// The remote write is later than the local one.
    RemoteNewer,
    /// Same write time, higher remote revision.
    HigherRevision,
    /// The local write is later than the remote one.
    LocalNewer,
    /// Same write time, remote revision not higher.
    NotNewer,
    /// The remote record carries no usable timestamp.
    Unstamped,
}

impl Resolution {
    /// Returns true if the remote record should overwrite local state.
    pub fn applies(self) -> bool {
        matches!(
            self,
            Resolution::NoLocalState | Resolution::RemoteNewer | Resolution::HigherRevision
        )
    }
}

/// Compares a remote record with the key's local revision.
pub fn resolve(local: Option<&KeyRevision>, remote: &RemoteRecord) -> Resolution {
    let Some(remote_at) = remote.updated_at.millis() else {
        return Resolution::Unstamped;
    };
    let Some(local) = local else {
        return Resolution::NoLocalState;
    };

    if remote_at < local.updated_at {
        Resolution::LocalNewer
    } else if remote_at > local.updated_at {
        Resolution::RemoteNewer
    } else if remote.rev > local.revision {
        Resolution::HigherRevision
    } else {
        Resolution::NotNewer
    }
}

/// Returns true if the remote record should be applied locally.
pub fn should_apply(local: Option<&KeyRevision>, remote: &RemoteRecord) -> bool {
    resolve(local, remote).applies()
}

/// Bookkeeping after applying `remote` over `local`.
///
/// The revision never moves backwards: a later write with a lower revision
/// keeps the higher local counter.
pub fn applied_revision(local: Option<&KeyRevision>, remote: &RemoteRecord) -> Option<KeyRevision> {
    let mut next = remote.key_revision()?;
    if let Some(local) = local {
        next.revision = next.revision.max(local.revision);
    }
    Some(next)
}

#[cfg(test)]
#[path = "merge_tests.rs"]
mod tests;

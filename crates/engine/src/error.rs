// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the sync engine.

use kvs_core::protocol::ErrorCode;
use thiserror::Error;

/// How the engine reacts to a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The user may not access the namespace. Not retried.
    Auth,
    /// Network or contention failure. Retried with backoff.
    Transient,
    /// The local store ran out of space.
    Quota,
    /// Bad data or a bug. Logged and skipped.
    Logic,
}

/// Failures reported by a [`RemoteStore`](crate::remote::RemoteStore).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("remote unavailable: {0}")]
    Unavailable(String),

    #[error("failed precondition: {0}")]
    FailedPrecondition(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl RemoteError {
    /// Maps a wire error code to a remote error.
    pub fn from_code(code: ErrorCode, message: impl Into<String>) -> Self {
        let message = message.into();
        match code {
            ErrorCode::PermissionDenied => RemoteError::PermissionDenied(message),
            ErrorCode::Unauthenticated => RemoteError::Unauthenticated(message),
            ErrorCode::Unavailable => RemoteError::Unavailable(message),
            ErrorCode::FailedPrecondition => RemoteError::FailedPrecondition(message),
            ErrorCode::InvalidArgument => RemoteError::InvalidArgument(message),
        }
    }

    /// Classifies the error for retry decisions.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RemoteError::PermissionDenied(_) | RemoteError::Unauthenticated(_) => ErrorKind::Auth,
            RemoteError::Unavailable(_) | RemoteError::FailedPrecondition(_) => {
                ErrorKind::Transient
            }
            RemoteError::InvalidArgument(_) => ErrorKind::Logic,
        }
    }
}

impl From<kvs_core::Error> for RemoteError {
    fn from(err: kvs_core::Error) -> Self {
        match err {
            kvs_core::Error::VersionConflict { .. } => {
                RemoteError::FailedPrecondition(err.to_string())
            }
            other => RemoteError::InvalidArgument(other.to_string()),
        }
    }
}

/// Result type for remote store operations.
pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// All errors surfaced by the engine and the CLI.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] kvs_core::Error),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("namespace '{0}' is not syncing")]
    NotSyncing(String),

    #[error("initial reconciliation failed: {0}")]
    ReconcileFailed(String),

    #[error("sync incomplete for {0}")]
    SyncIncomplete(String),

    #[error("key '{0}' not found")]
    KeyNotFound(String),

    #[error("invalid sync options: {0}")]
    InvalidOptions(String),

    #[error("no user is signed in\n  hint: set `user` in the config file")]
    NoUser,

    #[error("config error: {0}")]
    Config(String),

    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Classifies the error for retry decisions.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Remote(err) => err.kind(),
            Error::Core(kvs_core::Error::QuotaExceeded(_)) => ErrorKind::Quota,
            Error::Core(kvs_core::Error::VersionConflict { .. }) => ErrorKind::Transient,
            Error::NoUser => ErrorKind::Auth,
            _ => ErrorKind::Logic,
        }
    }
}

/// A specialized Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;

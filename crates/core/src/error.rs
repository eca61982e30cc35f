// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for kvs-core operations.

use thiserror::Error;

/// All possible errors that can occur in kvs-core operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("malformed record for key '{key}': {reason}")]
    MalformedRecord { key: String, reason: String },

    #[error("malformed document: {0}")]
    MalformedDocument(String),

    #[error("invalid stamp: {0}")]
    InvalidStamp(String),

    #[error("local storage quota exceeded while writing '{0}'\n  hint: free space or raise the store quota")]
    QuotaExceeded(String),

    #[error("version conflict: expected sync version {expected}, found {actual}")]
    VersionConflict { expected: u64, actual: u64 },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for kvs-core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;

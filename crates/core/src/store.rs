// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Local key-value stores.
//!
//! The [`LocalStore`] trait exposes only raw primitives. Writes made through
//! it are invisible to change interception; hosts write through the
//! intercepting wrapper in the sync engine instead.
//!
//! Each store also keeps an outbox: per document, the keys whose latest
//! local write has not been committed yet, with the revision it carries.
//! The outbox outlives the process so a restarted engine resends them.

use chrono::Utc;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

use crate::error::{Error, Result};

/// Raw access to a local key-value store.
pub trait LocalStore: Send + Sync {
    /// Reads a key.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Writes a key without triggering change interception.
    fn raw_set(&self, key: &str, value: &str) -> Result<()>;

    /// Deletes a key without triggering change interception.
    fn raw_delete(&self, key: &str) -> Result<()>;

    /// Lists all keys, sorted.
    fn keys(&self) -> Result<Vec<String>>;

    /// Lists the uncommitted writes recorded for `scope`, sorted by key.
    fn outbox(&self, scope: &str) -> Result<Vec<(String, OutboxEntry)>>;

    /// Records (`Some`) or clears (`None`) the uncommitted write for `key`.
    fn save_outbox(&self, scope: &str, key: &str, entry: Option<OutboxEntry>) -> Result<()>;
}

/// Bookkeeping of an uncommitted local write. The value itself is whatever
/// the store holds for the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutboxEntry {
    pub revision: u64,
    pub updated_at: u64,
}

/// In-process store with an optional entry quota.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
    outbox: Mutex<BTreeMap<(String, String), OutboxEntry>>,
    quota: Option<usize>,
}

impl MemoryStore {
    /// Creates an unbounded store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding at most `max_entries` keys.
    pub fn with_quota(max_entries: usize) -> Self {
        MemoryStore {
            quota: Some(max_entries),
            ..Self::default()
        }
    }
}

impl LocalStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries.get(key).cloned())
    }

    fn raw_set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(quota) = self.quota {
            if !entries.contains_key(key) && entries.len() >= quota {
                return Err(Error::QuotaExceeded(key.to_string()));
            }
        }
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn raw_delete(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries.keys().cloned().collect())
    }

    fn outbox(&self, scope: &str) -> Result<Vec<(String, OutboxEntry)>> {
        let outbox = self.outbox.lock().unwrap_or_else(|e| e.into_inner());
        Ok(outbox
            .iter()
            .filter(|((s, _), _)| s == scope)
            .map(|((_, key), entry)| (key.clone(), *entry))
            .collect())
    }

    fn save_outbox(&self, scope: &str, key: &str, entry: Option<OutboxEntry>) -> Result<()> {
        let mut outbox = self.outbox.lock().unwrap_or_else(|e| e.into_inner());
        let id = (scope.to_string(), key.to_string());
        match entry {
            Some(entry) => outbox.insert(id, entry),
            None => outbox.remove(&id),
        };
        Ok(())
    }
}

/// SQL schema for the local key-value and outbox tables.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS kv (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS outbox (
    scope TEXT NOT NULL,
    key TEXT NOT NULL,
    revision INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    PRIMARY KEY (scope, key)
);
"#;

/// SQLite-backed persistent store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (or creates) a store at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// Opens a transient in-memory store.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(SqliteStore {
            conn: Mutex::new(conn),
        })
    }

    /// Caps the database at its current size plus `extra_pages` pages.
    ///
    /// Writes that would grow it further fail with [`Error::QuotaExceeded`].
    pub fn limit_growth(&self, extra_pages: i64) -> Result<()> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let pages: i64 = conn.pragma_query_value(None, "page_count", |row| row.get(0))?;
        let _: i64 = conn.pragma_update_and_check(
            None,
            "max_page_count",
            pages + extra_pages,
            |row| row.get(0),
        )?;
        Ok(())
    }
}

fn write_error(key: &str, err: rusqlite::Error) -> Error {
    match err {
        rusqlite::Error::SqliteFailure(ref failure, _) if failure.code == ErrorCode::DiskFull => {
            Error::QuotaExceeded(key.to_string())
        }
        other => Error::Database(other),
    }
}

impl LocalStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let value = conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    fn raw_set(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        conn.execute(
            "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, Utc::now().to_rfc3339()],
        )
        .map_err(|e| write_error(key, e))?;
        Ok(())
    }

    fn raw_delete(&self, key: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let mut stmt = conn.prepare("SELECT key FROM kv ORDER BY key")?;
        let keys = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(keys)
    }

    // SQLite integers are signed; u64 columns go through a bit-preserving cast.
    fn outbox(&self, scope: &str) -> Result<Vec<(String, OutboxEntry)>> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let mut stmt = conn.prepare(
            "SELECT key, revision, updated_at FROM outbox WHERE scope = ?1 ORDER BY key",
        )?;
        let entries = stmt
            .query_map(params![scope], |row| {
                let entry = OutboxEntry {
                    revision: row.get::<_, i64>(1)? as u64,
                    updated_at: row.get::<_, i64>(2)? as u64,
                };
                Ok((row.get(0)?, entry))
            })?
            .collect::<std::result::Result<Vec<(String, OutboxEntry)>, _>>()?;
        Ok(entries)
    }

    fn save_outbox(&self, scope: &str, key: &str, entry: Option<OutboxEntry>) -> Result<()> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        match entry {
            Some(entry) => {
                conn.execute(
                    "INSERT INTO outbox (scope, key, revision, updated_at) VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(scope, key) DO UPDATE
                     SET revision = excluded.revision, updated_at = excluded.updated_at",
                    params![scope, key, entry.revision as i64, entry.updated_at as i64],
                )
                .map_err(|e| write_error(key, e))?;
            }
            None => {
                conn.execute(
                    "DELETE FROM outbox WHERE scope = ?1 AND key = ?2",
                    params![scope, key],
                )?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;

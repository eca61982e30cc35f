// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Write stamps for last-writer-wins ordering.
//!
//! A stamp pairs the time a value was last written with the key's revision
//! counter.
//!
//! Format: `{updated_at}-{revision}`
//!
//! Ordering rules:
//! 1. Later `updated_at` wins, regardless of revision
//! 2. If `updated_at` is equal, higher revision wins

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{Error, Result};

/// The `(updated_at, revision)` pair of a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Stamp {
    /// Milliseconds since the Unix epoch.
    pub updated_at: u64,
    /// Per-key revision counter.
    pub revision: u64,
}

impl Stamp {
    /// Creates a new stamp.
    pub fn new(updated_at: u64, revision: u64) -> Self {
        Stamp {
            updated_at,
            revision,
        }
    }

    /// Returns true if this stamp strictly supersedes the other.
    pub fn supersedes(&self, other: &Stamp) -> bool {
        self > other
    }

    /// Returns the write time as a UTC datetime, if representable.
    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        millis_to_datetime(self.updated_at)
    }
}

impl Ord for Stamp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.updated_at
            .cmp(&other.updated_at)
            .then_with(|| self.revision.cmp(&other.revision))
    }
}

impl PartialOrd for Stamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Stamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.updated_at, self.revision)
    }
}

impl FromStr for Stamp {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (at, rev) = s.split_once('-').ok_or_else(|| {
            Error::InvalidStamp(format!("expected format 'updated_at-revision', got '{s}'"))
        })?;

        let updated_at = at
            .parse::<u64>()
            .map_err(|_| Error::InvalidStamp(format!("invalid updated_at '{at}' in '{s}'")))?;

        let revision = rev
            .parse::<u64>()
            .map_err(|_| Error::InvalidStamp(format!("invalid revision '{rev}' in '{s}'")))?;

        Ok(Stamp::new(updated_at, revision))
    }
}

/// Converts epoch milliseconds to a UTC datetime.
pub fn millis_to_datetime(ms: u64) -> Option<DateTime<Utc>> {
    let ms = i64::try_from(ms).ok()?;
    Utc.timestamp_millis_opt(ms).single()
}

/// Trait for getting the current wall clock time.
///
/// This allows injecting a manual clock for testing.
pub trait ClockSource: Send + Sync {
    /// Returns the current time in milliseconds since Unix epoch.
    fn now_ms(&self) -> u64;
}

/// System clock implementation using `std::time::SystemTime`.
#[derive(Debug, Default)]
pub struct SystemClock;

impl ClockSource for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// A clock that only moves when told to.
///
/// Used by simulations and tests that need reproducible timestamps.
#[derive(Debug, Default)]
pub struct ManualClock {
    time_ms: AtomicU64,
}

impl ManualClock {
    /// Creates a clock reading `initial_ms`.
    pub fn new(initial_ms: u64) -> Self {
        ManualClock {
            time_ms: AtomicU64::new(initial_ms),
        }
    }

    /// Sets the current time.
    pub fn set(&self, ms: u64) {
        self.time_ms.store(ms, AtomicOrdering::SeqCst);
    }

    /// Moves the clock forward.
    pub fn advance(&self, ms: u64) {
        self.time_ms.fetch_add(ms, AtomicOrdering::SeqCst);
    }
}

impl ClockSource for ManualClock {
    fn now_ms(&self) -> u64 {
        self.time_ms.load(AtomicOrdering::SeqCst)
    }
}

#[cfg(test)]
#[path = "stamp_tests.rs"]
mod tests;

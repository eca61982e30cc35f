// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Tagged values carried through the sync pipeline.
//!
//! Local stores hold raw strings. Before a value leaves the device it is
//! lifted into a [`SyncValue`]: JSON literals other than strings become typed
//! scalars, objects and arrays become structured values, and every other
//! string is kept verbatim as text. [`SyncValue::to_raw`] is the inverse.
//!
//! Content hashes are computed over the canonical JSON form (object keys
//! sorted), so two values hash equal iff they serialize identically.

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use sha2::{Digest, Sha256};
use std::fmt;

/// Number of hash bytes kept in a content hash (16 hex chars).
const HASH_BYTES: usize = 8;

/// Hash reported for a deleted key. Not a hex string, so no value collides.
pub const TOMBSTONE_HASH: &str = "tombstone";

/// A scalar value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Number(Number),
    Text(String),
}

/// A value synchronized between the local and remote stores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "Value", from = "Value")]
pub enum SyncValue {
    /// Null, boolean, number or text.
    Scalar(Scalar),
    /// A JSON object or array.
    Structured(Value),
}

impl SyncValue {
    /// Creates a text value.
    pub fn text(s: impl Into<String>) -> Self {
        SyncValue::Scalar(Scalar::Text(s.into()))
    }

    /// Lifts a raw local-store string into a typed value.
    ///
    /// Raw strings that would come back altered stay text: a scalar must
    /// lower back to exactly `raw`, and a structured value must not hold a
    /// number that JSON parsing rounds.
    pub fn from_raw(raw: &str) -> Self {
        let value = match serde_json::from_str::<Value>(raw) {
            Ok(Value::String(_)) | Err(_) => return SyncValue::text(raw),
            Ok(value) => SyncValue::from(value),
        };
        let exact = match &value {
            SyncValue::Structured(_) => numbers_are_exact(raw),
            scalar => scalar.to_raw() == raw,
        };
        if exact {
            value
        } else {
            SyncValue::text(raw)
        }
    }

    /// Lowers the value back into the raw string kept by local stores.
    pub fn to_raw(&self) -> String {
        match self {
            SyncValue::Scalar(Scalar::Text(s)) => s.clone(),
            other => other.canonical(),
        }
    }

    /// Returns the JSON representation of this value.
    pub fn to_json(&self) -> Value {
        match self {
            SyncValue::Scalar(Scalar::Null) => Value::Null,
            SyncValue::Scalar(Scalar::Bool(b)) => Value::Bool(*b),
            SyncValue::Scalar(Scalar::Number(n)) => Value::Number(n.clone()),
            SyncValue::Scalar(Scalar::Text(s)) => Value::String(s.clone()),
            SyncValue::Structured(v) => v.clone(),
        }
    }

    /// Canonical serialized form: compact JSON with object keys sorted.
    pub fn canonical(&self) -> String {
        sorted(&self.to_json()).to_string()
    }

    /// Returns true for objects and arrays.
    pub fn is_structured(&self) -> bool {
        matches!(self, SyncValue::Structured(_))
    }
}

impl From<Value> for SyncValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => SyncValue::Scalar(Scalar::Null),
            Value::Bool(b) => SyncValue::Scalar(Scalar::Bool(b)),
            Value::Number(n) => SyncValue::Scalar(Scalar::Number(n)),
            Value::String(s) => SyncValue::Scalar(Scalar::Text(s)),
            structured => SyncValue::Structured(structured),
        }
    }
}

impl From<SyncValue> for Value {
    fn from(value: SyncValue) -> Self {
        match value {
            SyncValue::Structured(v) => v,
            SyncValue::Scalar(Scalar::Text(s)) => Value::String(s),
            scalar => scalar.to_json(),
        }
    }
}

impl fmt::Display for SyncValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_raw())
    }
}

/// Rebuilds a JSON tree with object keys inserted in sorted order, so the
/// output is stable whether or not `serde_json` preserves insertion order.
fn sorted(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = serde_json::Map::new();
            for key in keys {
                if let Some(v) = map.get(key) {
                    out.insert(key.clone(), sorted(v));
                }
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
        other => other.clone(),
    }
}

/// Checks that every number literal in `raw` survives parsing with its
/// value intact.
fn numbers_are_exact(raw: &str) -> bool {
    let bytes = raw.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'"' => {
                i += 1;
                while i < bytes.len() && bytes[i] != b'"' {
                    if bytes[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
                i += 1;
            }
            b'-' | b'0'..=b'9' => {
                let start = i;
                while i < bytes.len()
                    && matches!(bytes[i], b'-' | b'+' | b'.' | b'e' | b'E' | b'0'..=b'9')
                {
                    i += 1;
                }
                if !number_is_exact(&raw[start..i]) {
                    return false;
                }
            }
            _ => i += 1,
        }
    }
    true
}

fn number_is_exact(literal: &str) -> bool {
    match serde_json::from_str::<Value>(literal) {
        Ok(Value::Number(parsed)) => matches!(
            (decimal_parts(literal), decimal_parts(&parsed.to_string())),
            (Some(original), Some(parsed)) if original == parsed
        ),
        _ => false,
    }
}

/// Splits a decimal literal into sign, significant digits and the position
/// of the decimal point, so `"1.50"`, `"15e-1"` and `"1.5"` compare equal.
fn decimal_parts(literal: &str) -> Option<(bool, String, i64)> {
    let (negative, unsigned) = match literal.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, literal),
    };
    let (mantissa, exponent) = match unsigned.find(['e', 'E']) {
        Some(at) => (&unsigned[..at], unsigned[at + 1..].parse::<i64>().ok()?),
        None => (unsigned, 0),
    };
    let (int, frac) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    let digits = format!("{int}{frac}");
    let leading_zeros = digits.len() - digits.trim_start_matches('0').len();
    let significant = digits.trim_matches('0');
    if significant.is_empty() {
        return Some((false, String::new(), 0));
    }
    let point = int.len() as i64 - leading_zeros as i64 + exponent;
    Some((negative, significant.to_string(), point))
}

/// Hashes a value (or a deletion, for `None`) over its canonical form.
pub fn content_hash(value: Option<&SyncValue>) -> String {
    match value {
        Some(v) => {
            let digest = Sha256::digest(v.canonical().as_bytes());
            hex::encode(&digest[..HASH_BYTES])
        }
        None => TOMBSTONE_HASH.to_string(),
    }
}

/// Hashes a raw local-store string.
pub fn raw_content_hash(raw: Option<&str>) -> String {
    let value = raw.map(SyncValue::from_raw);
    content_hash(value.as_ref())
}

#[cfg(test)]
#[path = "value_tests.rs"]
mod tests;

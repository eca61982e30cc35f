// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use serde_json::json;
use yare::parameterized;

#[parameterized(
    integer = { "1" },
    float = { "1.5" },
    boolean = { "true" },
    null = { "null" },
    plain_text = { "Alice" },
    quoted_text = { "\"Alice\"" },
    not_json = { "{broken" },
    object = { "{\"a\":1,\"b\":[1,2]}" },
    array = { "[1,2,3]" },
    empty = { "" },
    long_digits = { "123456789012345678901234" },
    exponent = { "1e2" },
    trailing_zero = { "1.50" },
    leading_zero = { "007" },
    negative_zero = { "-0" },
)]
fn raw_roundtrip_is_exact(raw: &str) {
    assert_eq!(SyncValue::from_raw(raw).to_raw(), raw);
}

#[test]
fn from_raw_types_scalars() {
    assert_eq!(
        SyncValue::from_raw("1"),
        SyncValue::Scalar(Scalar::Number(1.into()))
    );
    assert_eq!(
        SyncValue::from_raw("false"),
        SyncValue::Scalar(Scalar::Bool(false))
    );
    assert_eq!(SyncValue::from_raw("Alice"), SyncValue::text("Alice"));
    assert!(SyncValue::from_raw("{\"a\":1}").is_structured());
}

#[parameterized(
    long_digits = { "123456789012345678901234" },
    beyond_u64 = { "49151123456789012345678" },
    exponent = { "1e2" },
    trailing_zero = { "1.50" },
)]
fn numbers_that_would_change_stay_text(raw: &str) {
    assert_eq!(SyncValue::from_raw(raw), SyncValue::text(raw));
}

#[test]
fn structured_value_with_rounded_number_stays_text() {
    let raw = "{\"id\":123456789012345678901234}";
    assert_eq!(SyncValue::from_raw(raw), SyncValue::text(raw));
}

#[test]
fn structured_value_with_exact_numbers_is_typed() {
    let value = SyncValue::from_raw("{\"b\": 0.1, \"a\": [-2, 1e3, \"9.99999999999999999999\"]}");
    assert!(value.is_structured());
    assert_eq!(value.to_raw(), "{\"a\":[-2,1000.0,\"9.99999999999999999999\"],\"b\":0.1}");
}

#[test]
fn serializes_as_plain_json() {
    let value = SyncValue::from_raw("1");
    assert_eq!(serde_json::to_value(&value).unwrap(), json!(1));

    let text = SyncValue::text("Alice");
    assert_eq!(serde_json::to_value(&text).unwrap(), json!("Alice"));

    let back: SyncValue = serde_json::from_value(json!({"x": [1]})).unwrap();
    assert!(back.is_structured());
}

#[test]
fn hash_ignores_key_order() {
    let a = SyncValue::from_raw("{\"a\":1,\"b\":2}");
    let b = SyncValue::from_raw("{\"b\":2,\"a\":1}");
    assert_eq!(content_hash(Some(&a)), content_hash(Some(&b)));
}

#[test]
fn hash_distinguishes_values() {
    let a = SyncValue::from_raw("1");
    let b = SyncValue::from_raw("2");
    assert_ne!(content_hash(Some(&a)), content_hash(Some(&b)));
    assert_eq!(content_hash(Some(&a)).len(), 16);
}

#[test]
fn deletion_hash_differs_from_null() {
    let null = SyncValue::from_raw("null");
    assert_ne!(content_hash(Some(&null)), content_hash(None));
    assert_eq!(raw_content_hash(None), TOMBSTONE_HASH);
}

// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Config discovery and validation errors.

#![allow(clippy::panic)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use super::common::*;
use yare::parameterized;

#[test]
fn missing_config_fails_with_hint() {
    let temp = TempDir::new().unwrap();
    kvsync_in(temp.path())
        .arg("keys")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no kvsync.toml found"))
        .stderr(predicate::str::contains("hint:"));
}

#[test]
fn explicit_config_path_is_used() {
    let temp = TempDir::new().unwrap();
    let config = temp.path().join("custom.toml");
    std::fs::write(&config, "store = \"custom.db\"\n").unwrap();
    let elsewhere = TempDir::new().unwrap();

    kvsync_in(elsewhere.path())
        .arg("--config")
        .arg(&config)
        .args(["set", "theme", "dark"])
        .assert()
        .success();
    assert!(temp.path().join("custom.db").exists());
}

#[test]
fn explicit_missing_config_fails() {
    let temp = TempDir::new().unwrap();
    kvsync_in(temp.path())
        .args(["--config", "nope.toml", "keys"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read"));
}

#[parameterized(
    not_toml = { "store = [", "failed to parse config" },
    http_url = { "[remote]\nurl = \"http://example.com\"\n", "must be ws:// or wss://" },
    slash_namespace = { "[[namespace]]\nname = \"a/b\"\n", "invalid namespace name" },
    duplicate_namespace = {
        "[[namespace]]\nname = \"app\"\n[[namespace]]\nname = \"app\"\n",
        "duplicate namespace"
    },
)]
fn invalid_config_is_rejected(config: &str, message: &str) {
    let temp = workspace_with(config);
    kvsync_in(temp.path())
        .arg("keys")
        .assert()
        .failure()
        .stderr(predicate::str::contains(message));
}

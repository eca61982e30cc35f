// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Local-only get/set/delete/keys.

#![allow(clippy::panic)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use super::common::*;
use yare::parameterized;

#[test]
fn set_then_get() {
    let temp = local_workspace();
    kvsync_in(temp.path())
        .args(["set", "theme", "dark"])
        .assert()
        .success();

    kvsync_in(temp.path())
        .args(["get", "theme"])
        .assert()
        .success()
        .stdout("dark\n");
}

#[test]
fn set_creates_store_next_to_config() {
    let temp = local_workspace();
    kvsync_in(temp.path())
        .args(["set", "theme", "dark"])
        .assert()
        .success();
    assert!(temp.path().join("local.db").exists());
}

#[test]
fn set_overwrites() {
    let temp = local_workspace();
    kvsync_in(temp.path()).args(["set", "theme", "dark"]).assert().success();
    kvsync_in(temp.path()).args(["set", "theme", "light"]).assert().success();

    kvsync_in(temp.path())
        .args(["get", "theme"])
        .assert()
        .success()
        .stdout("light\n");
}

#[parameterized(
    number = { "0.8" },
    json_object = { r#"{"cols":2,"rows":3}"# },
    json_array = { "[1,2,3]" },
    spaces = { "hello world" },
    empty = { "" },
)]
fn values_are_stored_verbatim(value: &str) {
    let temp = local_workspace();
    kvsync_in(temp.path()).args(["set", "k", value]).assert().success();

    kvsync_in(temp.path())
        .args(["get", "k"])
        .assert()
        .success()
        .stdout(format!("{value}\n"));
}

#[test]
fn get_missing_key_fails() {
    let temp = local_workspace();
    kvsync_in(temp.path())
        .args(["get", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("key 'nope' not found"));
}

#[test]
fn delete_removes_key() {
    let temp = local_workspace();
    kvsync_in(temp.path()).args(["set", "theme", "dark"]).assert().success();
    kvsync_in(temp.path()).args(["delete", "theme"]).assert().success();

    kvsync_in(temp.path()).args(["get", "theme"]).assert().failure();
}

#[test]
fn delete_missing_key_fails() {
    let temp = local_workspace();
    kvsync_in(temp.path())
        .args(["delete", "theme"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn keys_are_listed_sorted() {
    let temp = local_workspace();
    for key in ["volume", "theme", "font"] {
        kvsync_in(temp.path()).args(["set", key, "x"]).assert().success();
    }

    kvsync_in(temp.path())
        .arg("keys")
        .assert()
        .success()
        .stdout("font\ntheme\nvolume\n");
}

#[test]
fn keys_on_empty_store_prints_nothing() {
    let temp = local_workspace();
    kvsync_in(temp.path()).arg("keys").assert().success().stdout("");
}

#[test]
fn config_is_found_from_subdirectory() {
    let temp = local_workspace();
    let sub = temp.path().join("a").join("b");
    std::fs::create_dir_all(&sub).unwrap();

    kvsync_in(&sub).args(["set", "theme", "dark"]).assert().success();
    kvsync_in(temp.path())
        .args(["get", "theme"])
        .assert()
        .success()
        .stdout("dark\n");
}

#[test]
fn tracked_key_without_user_stays_local() {
    let temp = workspace_with(
        "store = \"local.db\"\n\
         [remote]\n\
         url = \"ws://127.0.0.1:9\"\n\
         [[namespace]]\n\
         name = \"app\"\n\
         keys = [\"theme\"]\n",
    );
    kvsync_in(temp.path())
        .args(["set", "theme", "dark"])
        .assert()
        .success()
        .stderr(predicate::str::contains("no user is signed in"));

    kvsync_in(temp.path())
        .args(["get", "theme"])
        .assert()
        .success()
        .stdout("dark\n");
}

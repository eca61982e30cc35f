// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Two devices syncing through a live kvs-remote.

#![allow(clippy::panic)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use super::common::*;

#[test]
fn sync_requires_a_remote() {
    let temp = local_workspace();
    kvsync_in(temp.path())
        .arg("sync")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no remote configured"));
}

#[test]
fn sync_requires_a_user() {
    let temp = workspace_with("[remote]\nurl = \"ws://127.0.0.1:9\"\n");
    kvsync_in(temp.path())
        .arg("sync")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no user is signed in"));
}

#[test]
fn watch_requires_namespaces() {
    let temp = workspace_with("user = \"alice\"\n[remote]\nurl = \"ws://127.0.0.1:9\"\n");
    kvsync_in(temp.path())
        .arg("watch")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no namespaces configured"));
}

#[test]
fn write_on_one_device_reaches_another() {
    let server = RemoteServer::start();
    let laptop = workspace_with(&remote_config(&server.url(), "alice"));
    let phone = workspace_with(&remote_config(&server.url(), "alice"));

    kvsync_in(laptop.path())
        .args(["set", "theme", "dark"])
        .assert()
        .success();

    kvsync_in(phone.path())
        .arg("sync")
        .assert()
        .success()
        .stdout(predicate::str::contains("app:"))
        .stdout(predicate::str::contains("reconciled:"));

    kvsync_in(phone.path())
        .args(["get", "theme"])
        .assert()
        .success()
        .stdout("dark\n");
}

#[test]
fn sync_uploads_local_only_keys() {
    let server = RemoteServer::start();
    let laptop = workspace_with(&remote_config(&server.url(), "alice"));
    let phone = workspace_with(&remote_config(&server.url(), "alice"));

    // Written while signed out of sync: only the local store has it
    std::fs::write(laptop.path().join("offline.toml"), "store = \"local.db\"\n").unwrap();
    kvsync_in(laptop.path())
        .args(["--config", "offline.toml", "set", "volume", "0.8"])
        .assert()
        .success();

    let out = stdout_of(kvsync_in(laptop.path()).args(["sync", "-o", "json"]));
    let json: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(json[0]["namespace"], "app");
    assert_eq!(json[0]["reconcile"]["uploaded"], 1);

    kvsync_in(phone.path()).arg("sync").assert().success();
    kvsync_in(phone.path())
        .args(["get", "volume"])
        .assert()
        .success()
        .stdout("0.8\n");
}

#[test]
fn deletes_propagate() {
    let server = RemoteServer::start();
    let laptop = workspace_with(&remote_config(&server.url(), "alice"));
    let phone = workspace_with(&remote_config(&server.url(), "alice"));

    kvsync_in(laptop.path()).args(["set", "theme", "dark"]).assert().success();
    kvsync_in(phone.path()).arg("sync").assert().success();
    kvsync_in(phone.path()).args(["get", "theme"]).assert().success();

    kvsync_in(laptop.path()).args(["delete", "theme"]).assert().success();
    kvsync_in(phone.path())
        .arg("sync")
        .assert()
        .success()
        .stdout(predicate::str::contains("reconciled:"));
    kvsync_in(phone.path()).args(["get", "theme"]).assert().failure();
}

#[test]
fn users_do_not_see_each_other() {
    let server = RemoteServer::start();
    let alice = workspace_with(&remote_config(&server.url(), "alice"));
    let bob = workspace_with(&remote_config(&server.url(), "bob"));

    kvsync_in(alice.path()).args(["set", "theme", "dark"]).assert().success();
    kvsync_in(bob.path()).arg("sync").assert().success();
    kvsync_in(bob.path()).args(["get", "theme"]).assert().failure();
}

#[test]
fn unreachable_remote_keeps_local_write() {
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .and_then(|l| l.local_addr())
        .map(|a| a.port())
        .unwrap();
    let temp = workspace_with(&remote_config(&format!("ws://127.0.0.1:{port}"), "alice"));

    kvsync_in(temp.path())
        .args(["set", "theme", "dark"])
        .assert()
        .success()
        .stderr(predicate::str::contains("saved locally"));

    kvsync_in(temp.path())
        .args(["get", "theme"])
        .assert()
        .success()
        .stdout("dark\n");

    kvsync_in(temp.path()).arg("sync").assert().failure();
}

#[test]
fn write_made_while_remote_is_down_is_sent_by_next_sync() {
    let data = TempDir::new().unwrap();
    let mut server = RemoteServer::start_persistent(data.path());
    let laptop = workspace_with(&remote_config(&server.url(), "alice"));
    let phone = workspace_with(&remote_config(&server.url(), "alice"));

    kvsync_in(laptop.path()).args(["set", "theme", "dark"]).assert().success();

    server.stop();
    kvsync_in(laptop.path())
        .args(["set", "theme", "light"])
        .assert()
        .success()
        .stderr(predicate::str::contains("saved locally"));

    // A later run resends the write instead of taking the stale remote value
    server.resume();
    kvsync_in(laptop.path()).arg("sync").assert().success();
    kvsync_in(laptop.path())
        .args(["get", "theme"])
        .assert()
        .success()
        .stdout("light\n");

    kvsync_in(phone.path()).arg("sync").assert().success();
    kvsync_in(phone.path())
        .args(["get", "theme"])
        .assert()
        .success()
        .stdout("light\n");
}

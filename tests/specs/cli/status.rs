// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::panic)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use super::common::*;

#[test]
fn local_status_shows_mode_and_keys() {
    let temp = local_workspace();
    kvsync_in(temp.path()).args(["set", "theme", "dark"]).assert().success();

    kvsync_in(temp.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Mode: local"))
        .stdout(predicate::str::contains("(1 keys)"))
        .stdout(predicate::str::contains("No namespaces configured."));
}

#[test]
fn local_status_lists_tracked_keys() {
    let temp = workspace_with(
        "store = \"local.db\"\n[[namespace]]\nname = \"app\"\nkeys = [\"theme\", \"volume\"]\n",
    );

    kvsync_in(temp.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("app\n  theme\n  volume"));
}

#[test]
fn status_json_is_structured() {
    let temp = workspace_with(
        "store = \"local.db\"\n[[namespace]]\nname = \"app\"\nkeys = [\"theme\"]\n",
    );
    let out = stdout_of(kvsync_in(temp.path()).args(["status", "-o", "json"]));

    let json: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(json["mode"], "local");
    assert_eq!(json["local_keys"], 0);
    assert_eq!(json["namespaces"][0]["namespace"], "app");
    assert_eq!(json["namespaces"][0]["keys"][0]["state"], "unknown");
}

#[test]
fn remote_status_compares_keys() {
    let server = RemoteServer::start();
    let temp = workspace_with(&remote_config(&server.url(), "alice"));

    kvsync_in(temp.path()).args(["set", "theme", "dark"]).assert().success();
    let out = stdout_of(kvsync_in(temp.path()).args(["status", "-o", "json"]));

    let json: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(json["mode"], "remote");
    let ns = &json["namespaces"][0];
    assert_eq!(ns["remote_version"], 1);
    assert_eq!(ns["keys"][0]["key"], "theme");
    assert_eq!(ns["keys"][0]["state"], "in_sync");
    assert_eq!(ns["keys"][1]["key"], "volume");
    assert_eq!(ns["keys"][1]["state"], "absent");
}

#[test]
fn remote_status_reports_unreachable_server() {
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .and_then(|l| l.local_addr())
        .map(|a| a.port())
        .unwrap();
    let temp = workspace_with(&remote_config(&format!("ws://127.0.0.1:{port}"), "alice"));

    kvsync_in(temp.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("remote unavailable"));
}

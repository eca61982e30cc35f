// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::panic)]
#![allow(clippy::unwrap_used)]

use super::common::*;
use yare::parameterized;

#[test]
fn help_lists_commands() {
    kvsync()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("get"))
        .stdout(predicate::str::contains("sync"))
        .stdout(predicate::str::contains("watch"))
        .stdout(predicate::str::contains("Get started:"));
}

#[parameterized(
    get = { "get" },
    set = { "set" },
    delete = { "delete" },
)]
fn commands_without_args_show_help(command: &str) {
    kvsync()
        .arg(command)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn unknown_command_fails() {
    kvsync().arg("frobnicate").assert().failure();
}

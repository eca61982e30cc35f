// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use tempfile::tempdir;
use yare::parameterized;

#[test]
fn sync_config_defaults() {
    let config = SyncConfig::default();
    assert_eq!(config.debounce(), Duration::from_millis(300));
    assert_eq!(config.retry_delay_ms, 1000);
    assert_eq!(config.max_retry_attempts, 3);
    assert_eq!(config.sync_lock_grace(), Duration::from_millis(100));
    assert_eq!(config.reconcile_delay(), Duration::from_millis(500));
}

#[parameterized(
    first = { 1, 1000 },
    second = { 2, 2000 },
    third = { 3, 4000 },
    capped = { 10, 30_000 },
    huge = { 200, 30_000 },
)]
fn backoff_doubles_until_cap(attempt: u32, expected_ms: u64) {
    let config = SyncConfig::default();
    assert_eq!(config.backoff(attempt), Duration::from_millis(expected_ms));
}

#[test]
fn parse_full_config() {
    let config = Config::parse(
        r#"
store = "data/local.db"
user = "alice"

[remote]
url = "ws://localhost:7890"

[sync]
debounce_ms = 50

[[namespace]]
name = "app"
keys = ["theme", "font_size"]

[[namespace]]
name = "editor"
keys = ["theme"]
"#,
    )
    .unwrap();

    assert_eq!(config.user.as_deref(), Some("alice"));
    assert!(config.is_remote_mode());
    assert_eq!(config.sync.debounce_ms, 50);
    // Unset fields keep their defaults
    assert_eq!(config.sync.retry_delay_ms, 1000);
    assert_eq!(config.namespaces.len(), 2);
    assert_eq!(config.namespaces_tracking("theme").len(), 2);
    assert_eq!(config.namespaces_tracking("font_size").len(), 1);
    assert!(config.namespaces_tracking("missing").is_empty());
}

#[test]
fn parse_minimal_config() {
    let config = Config::parse("").unwrap();
    assert_eq!(config.store, "kvsync.db");
    assert!(config.user.is_none());
    assert!(!config.is_remote_mode());
    assert_eq!(config.sync, SyncConfig::default());
}

#[parameterized(
    bad_url = { "[remote]\nurl = \"http://example.com\"" },
    empty_name = { "[[namespace]]\nname = \"\"" },
    slash_name = { "[[namespace]]\nname = \"a/b\"" },
    duplicate = { "[[namespace]]\nname = \"a\"\n[[namespace]]\nname = \"a\"" },
)]
fn invalid_configs_rejected(content: &str) {
    assert!(matches!(Config::parse(content), Err(Error::Config(_))));
}

#[test]
fn syntax_errors_surface_as_parse_errors() {
    assert!(matches!(
        Config::parse("store = "),
        Err(Error::ConfigParse(_))
    ));
}

#[test]
fn store_path_relative_to_config() {
    let config = Config::parse("store = \"local.db\"").unwrap();
    let path = config.store_path(Path::new("/work/project/kvsync.toml"));
    assert_eq!(path, PathBuf::from("/work/project/local.db"));

    let config = Config::parse("store = \"/var/lib/kv.db\"").unwrap();
    let path = config.store_path(Path::new("/work/project/kvsync.toml"));
    assert_eq!(path, PathBuf::from("/var/lib/kv.db"));
}

#[test]
fn find_config_walks_up() {
    let dir = tempdir().unwrap();
    let nested = dir.path().join("a/b/c");
    fs::create_dir_all(&nested).unwrap();
    fs::write(dir.path().join(CONFIG_FILE_NAME), "").unwrap();

    let found = find_config(&nested).unwrap();
    assert_eq!(found, dir.path().join(CONFIG_FILE_NAME));
}

#[test]
fn load_missing_file_fails() {
    let dir = tempdir().unwrap();
    let err = Config::load(&dir.path().join("nope.toml")).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

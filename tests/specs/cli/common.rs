// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

// Allow unused items: test helpers are shared across multiple test files,
// and not every test file uses every helper.
#![allow(dead_code)]
#![allow(unused_imports)]
#![allow(clippy::panic)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process::{Child, Stdio};
use std::time::{Duration, Instant};

use assert_cmd::Command;

pub use predicates::prelude::*;
pub use tempfile::TempDir;

pub fn kvsync() -> Command {
    #[allow(deprecated)]
    Command::cargo_bin("kvsync").unwrap()
}

/// Runs kvsync inside `dir`, isolated from any user-level config.
pub fn kvsync_in(dir: &Path) -> Command {
    let mut cmd = kvsync();
    cmd.current_dir(dir)
        .env("XDG_CONFIG_HOME", dir.join(".xdg"))
        .env("HOME", dir)
        .env_remove("RUST_LOG");
    cmd
}

/// A temp directory with a local-only kvsync.toml.
pub fn local_workspace() -> TempDir {
    workspace_with("store = \"local.db\"\n")
}

/// A temp directory with the given kvsync.toml contents.
pub fn workspace_with(config: &str) -> TempDir {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("kvsync.toml"), config).unwrap();
    temp
}

/// Config for a workspace syncing namespace `app` (keys theme, volume)
/// as `user` against `url`.
pub fn remote_config(url: &str, user: &str) -> String {
    format!(
        "store = \"local.db\"\n\
         user = \"{user}\"\n\
         \n\
         [remote]\n\
         url = \"{url}\"\n\
         request_timeout_secs = 5\n\
         \n\
         [sync]\n\
         retry_delay_ms = 50\n\
         max_retry_delay_ms = 200\n\
         \n\
         [[namespace]]\n\
         name = \"app\"\n\
         keys = [\"theme\", \"volume\"]\n"
    )
}

/// Reads stdout of a successful kvsync run, trimmed.
pub fn stdout_of(cmd: &mut Command) -> String {
    let output = cmd.output().unwrap();
    assert!(
        output.status.success(),
        "command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// A kvs-remote process on a free port, killed on drop.
pub struct RemoteServer {
    child: Option<Child>,
    port: u16,
    data: Option<PathBuf>,
}

impl RemoteServer {
    /// Starts a server keeping documents in memory.
    pub fn start() -> Self {
        Self::launch(None)
    }

    /// Starts a server persisting documents in `data`, so they survive
    /// [`RemoteServer::stop`].
    pub fn start_persistent(data: &Path) -> Self {
        Self::launch(Some(data.to_path_buf()))
    }

    fn launch(data: Option<PathBuf>) -> Self {
        let port = TcpListener::bind("127.0.0.1:0")
            .and_then(|l| l.local_addr())
            .map(|a| a.port())
            .unwrap();
        let mut server = RemoteServer {
            child: None,
            port,
            data,
        };
        server.resume();
        server
    }

    /// Kills the process. The port stays reserved for [`RemoteServer::resume`].
    pub fn stop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }

    /// Starts the process again on the same port and data directory.
    pub fn resume(&mut self) {
        assert!(self.child.is_none(), "kvs-remote is already running");

        #[allow(deprecated)]
        let bin = assert_cmd::cargo::cargo_bin("kvs-remote");
        let mut cmd = std::process::Command::new(bin);
        cmd.arg("--bind").arg(format!("127.0.0.1:{}", self.port));
        if let Some(data) = &self.data {
            cmd.arg("--data").arg(data);
        }
        let child = cmd
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("spawn kvs-remote");
        self.child = Some(child);

        // Wait until it accepts connections
        let deadline = Instant::now() + Duration::from_secs(10);
        while std::net::TcpStream::connect(("127.0.0.1", self.port)).is_err() {
            assert!(Instant::now() < deadline, "kvs-remote did not start");
            std::thread::sleep(Duration::from_millis(50));
        }
    }

    pub fn url(&self) -> String {
        format!("ws://127.0.0.1:{}", self.port)
    }
}

impl Drop for RemoteServer {
    fn drop(&mut self) {
        self.stop();
    }
}

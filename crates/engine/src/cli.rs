// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Output format for commands supporting structured output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

const QUICKSTART_HELP: &str = "\
Get started:
  kvsync set theme dark     Write a key (synced if a namespace tracks it)
  kvsync get theme          Read a key
  kvsync sync               Reconcile every namespace with the remote
  kvsync watch              Print remote changes as they arrive";

#[derive(Parser, Debug)]
#[command(name = "kvsync")]
#[command(about = "Keep selected keys of a local store in sync with a remote")]
#[command(after_help = QUICKSTART_HELP)]
pub struct Cli {
    /// Path to kvsync.toml (default: search upward from the current directory)
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the value of a key
    #[command(arg_required_else_help = true)]
    Get {
        /// Key to read
        key: String,
    },

    /// Write a key and sync it to every namespace tracking it
    #[command(
        arg_required_else_help = true,
        after_help = "Examples:\n  \
        kvsync set theme dark            Store a string\n  \
        kvsync set volume 0.8            Store a number\n  \
        kvsync set layout '{\"cols\":2}'   Store structured JSON"
    )]
    Set {
        /// Key to write
        key: String,
        /// Raw value; JSON objects and arrays sync as structured values
        value: String,
    },

    /// Delete a key and sync the deletion
    #[command(arg_required_else_help = true)]
    Delete {
        /// Key to delete
        key: String,
    },

    /// List local keys
    Keys,

    /// Reconcile every configured namespace with the remote, then exit
    Sync {
        /// Output format
        #[arg(long, short, value_enum, default_value_t)]
        output: OutputFormat,
    },

    /// Sync until interrupted, printing remote changes
    Watch,

    /// Compare tracked keys against the remote
    Status {
        /// Output format
        #[arg(long, short, value_enum, default_value_t)]
        output: OutputFormat,
    },
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;

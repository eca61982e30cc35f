// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! kvs-remote: WebSocket relay server for kvsync documents.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use kvs_remote::ServerState;

/// kvs-remote: key-value sync relay server
#[derive(Parser, Debug)]
#[command(name = "kvs-remote")]
#[command(about = "WebSocket relay server holding kvsync namespace documents")]
struct Args {
    /// Address to bind the server to
    #[arg(short, long, default_value = "0.0.0.0:7890")]
    bind: SocketAddr,

    /// Directory for document storage (in-memory when omitted)
    #[arg(short, long)]
    data: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting kvs-remote server");
    info!("  Bind address: {}", args.bind);

    let state = match &args.data {
        Some(dir) => {
            info!("  Data directory: {}", dir.display());
            ServerState::open(dir)?
        }
        None => {
            info!("  Data directory: none (documents are not persisted)");
            ServerState::in_memory()
        }
    };

    let listener = TcpListener::bind(args.bind).await?;
    kvs_remote::serve(listener, state).await?;

    Ok(())
}

// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! kvs-remote: WebSocket relay holding the canonical per-namespace documents.
//!
//! Clients identify as a user, then read, subscribe to and compare-and-swap
//! commit documents under `users/{user}/sync/{namespace}`. Every accepted
//! commit is pushed to the subscribers of its path.

pub mod server;
pub mod state;

pub use server::serve;
pub use state::ServerState;

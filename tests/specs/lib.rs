// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Black-box specs for the `kvsync` and `kvs-remote` binaries.

#[cfg(test)]
mod cli;

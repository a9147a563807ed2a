// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plain HTTP endpoints served on the same port as the RPC WebSocket.

/// `POST /heartbeat` — liveness probe, returns the server version as text.
pub async fn heartbeat() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

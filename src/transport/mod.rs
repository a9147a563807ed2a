// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! External interfaces: the single-port HTTP+WebSocket listener and its
//! optional mTLS wrapping.

pub mod http;
pub mod tls;
pub mod ws;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::server::ServerDispatcher;

/// Build the `axum::Router` serving both the ancillary HTTP endpoints and
/// the RPC WebSocket upgrade on one port.
pub fn build_router(dispatcher: Arc<ServerDispatcher>) -> Router {
    Router::new()
        .route("/heartbeat", post(http::heartbeat))
        .route("/ws", get(ws::ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(dispatcher)
}

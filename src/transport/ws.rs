// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `GET /ws` — upgrade to the framed full-duplex RPC connection. The
//! handshake: the first frame on a newly accepted socket must be a bare
//! text frame carrying the client identifier.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::StreamExt;

use crate::server::ServerDispatcher;
use crate::session::server_socket::ServerSocket;
use crate::wire::Frame;

/// `GET /ws` handler.
pub async fn ws_handler(
    State(dispatcher): State<Arc<ServerDispatcher>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(dispatcher, socket))
}

/// Per-socket read loop: handshake, then dispatch every recognized inbound
/// frame until the socket closes. A dropped socket only detaches — the
/// logical client session survives and reattaches on the next handshake
/// with the same client id.
async fn handle_connection(dispatcher: Arc<ServerDispatcher>, socket: WebSocket) {
    let (sink, mut stream) = socket.split();

    let client_id = match stream.next().await {
        Some(Ok(Message::Text(text))) => text.to_string(),
        Some(Ok(Message::Close(_))) | None => return,
        Some(Ok(_)) => {
            tracing::warn!("expected bare client id as first frame, got a non-text message");
            return;
        }
        Some(Err(err)) => {
            tracing::warn!(error = %err, "socket read error during handshake");
            return;
        }
    };

    let socket_session = ServerSocket::spawn(sink);
    dispatcher.attach_socket(&client_id, socket_session).await;
    tracing::info!(client_id = %client_id, "client socket attached");

    loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => match Frame::parse(&text) {
                Ok(frame) if frame.is_recognized() => {
                    dispatcher.dispatch(&client_id, frame).await;
                }
                Ok(_) => tracing::warn!(client_id = %client_id, "ignoring frame with unrecognized protocol/channel"),
                Err(err) => tracing::warn!(client_id = %client_id, error = %err, "dropping malformed frame"),
            },
            Some(Ok(Message::Close(_))) | None => break,
            Some(Ok(_)) => {}
            Some(Err(err)) => {
                tracing::warn!(client_id = %client_id, error = %err, "socket read error");
                break;
            }
        }
    }

    dispatcher.detach_socket(&client_id).await;
    tracing::info!(client_id = %client_id, "client socket detached");
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Server-accepted socket session: wraps the sender half of an axum
//! `WebSocket` behind an outbound `mpsc` channel drained by a dedicated task,
//! so [`SocketSession::send`] itself never awaits the network.

use std::sync::atomic::{AtomicBool, Ordering};

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::SinkExt;
use tokio::sync::mpsc;

use crate::error::TransportError;
use crate::session::{BoxFuture, SocketSession};
use crate::wire::Frame;

/// Server-side half of one accepted WebSocket upgrade.
///
/// Constructed per accepted socket (not per logical client — a logical
/// client's [`crate::server::ClientSession`] swaps its attached
/// `ServerSocket` out across reconnects).
pub struct ServerSocket {
    outbound: mpsc::UnboundedSender<Frame>,
    closed: AtomicBool,
}

impl ServerSocket {
    /// Spawn the drain task over `sink` and return the handle plus the
    /// drain task's join handle (the caller owns shutdown via `close`).
    pub fn spawn(sink: SplitSink<WebSocket, Message>) -> std::sync::Arc<Self> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Frame>();
        let mut sink = sink;
        tokio::spawn(async move {
            while let Some(frame) = rx.recv().await {
                let text = match frame.encode() {
                    Ok(text) => text,
                    Err(err) => {
                        tracing::warn!(error = %err, "dropping frame that failed to encode");
                        continue;
                    }
                };
                if sink.send(Message::Text(text.into())).await.is_err() {
                    tracing::debug!("server socket write failed, draining stopped");
                    break;
                }
            }
            let _ = sink.close().await;
        });
        std::sync::Arc::new(Self {
            outbound: tx,
            closed: AtomicBool::new(false),
        })
    }
}

impl SocketSession for ServerSocket {
    fn send(&self, frame: Frame) -> BoxFuture<'_, Result<(), TransportError>> {
        let result = self
            .outbound
            .send(frame)
            .map_err(|_| TransportError::SocketClosed("server socket closed".into()));
        Box::pin(async move { result })
    }

    fn close(&self) -> BoxFuture<'_, ()> {
        self.closed.store(true, Ordering::Release);
        Box::pin(async move {})
    }
}

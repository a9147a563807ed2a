// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client-dialed socket session: connects to the server's `GET /ws` upgrade
//! endpoint, performs the client-identifier handshake, and transparently
//! redials on disconnect so the dispatcher above it never has to know a
//! reconnect happened — only that a send queued for a moment.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message as WsMessage;

use crate::error::TransportError;
use crate::session::{BoxFuture, SocketSession};
use crate::wire::Frame;

/// Lifecycle signal surfaced to callers that care about reconnects (mostly
/// diagnostics; the queueing behavior itself doesn't depend on observers).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnected,
}

/// Client-side socket session with built-in reconnect.
///
/// `send` pushes onto an unbounded channel that survives redials — frames
/// enqueued while disconnected are held, not dropped, and flush in order
/// once the next connection attempt succeeds.
pub struct ClientSocket {
    outbound: mpsc::UnboundedSender<Frame>,
    state: watch::Sender<ConnectionState>,
    closing: Arc<AtomicBool>,
}

impl ClientSocket {
    /// Dial `url`, handshake with `client_id`, and keep reconnecting in the
    /// background until `close()` is called. Every frame successfully
    /// parsed off the wire is handed to `on_inbound`.
    pub fn connect<F>(url: String, client_id: String, on_inbound: F) -> Arc<Self>
    where
        F: Fn(Frame) + Send + Sync + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel::<Frame>();
        let (state_tx, _state_rx) = watch::channel(ConnectionState::Connecting);
        let closing = Arc::new(AtomicBool::new(false));
        let session = Arc::new(Self {
            outbound: tx,
            state: state_tx,
            closing: Arc::clone(&closing),
        });
        tokio::spawn(Self::run(url, client_id, rx, session.state.clone(), closing, on_inbound));
        session
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    async fn run<F>(
        url: String,
        client_id: String,
        mut rx: mpsc::UnboundedReceiver<Frame>,
        state: watch::Sender<ConnectionState>,
        closing: Arc<AtomicBool>,
        on_inbound: F,
    ) where
        F: Fn(Frame) + Send + Sync + 'static,
    {
        let mut attempt: u32 = 0;
        'reconnect: loop {
            if closing.load(Ordering::Acquire) {
                return;
            }
            let _ = state.send(ConnectionState::Connecting);
            let conn = match tokio_tungstenite::connect_async(&url).await {
                Ok((stream, _response)) => stream,
                Err(err) => {
                    tracing::warn!(error = %err, attempt, "failed to connect, retrying");
                    Self::backoff(attempt).await;
                    attempt = attempt.saturating_add(1);
                    continue 'reconnect;
                }
            };
            let (mut sink, mut stream) = conn.split();
            if sink.send(WsMessage::Text(client_id.clone().into())).await.is_err() {
                Self::backoff(attempt).await;
                attempt = attempt.saturating_add(1);
                continue 'reconnect;
            }
            attempt = 0;
            let _ = state.send(ConnectionState::Connected);

            loop {
                tokio::select! {
                    maybe_frame = rx.recv() => {
                        let Some(frame) = maybe_frame else {
                            let _ = sink.close().await;
                            return;
                        };
                        let text = match frame.encode() {
                            Ok(text) => text,
                            Err(err) => {
                                tracing::warn!(error = %err, "dropping frame that failed to encode");
                                continue;
                            }
                        };
                        if sink.send(WsMessage::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    incoming = stream.next() => {
                        match incoming {
                            Some(Ok(WsMessage::Text(text))) => {
                                match Frame::parse(&text) {
                                    Ok(frame) if frame.is_recognized() => on_inbound(frame),
                                    Ok(_) => tracing::warn!("ignoring frame with unrecognized protocol/channel"),
                                    Err(err) => tracing::warn!(error = %err, "dropping malformed frame"),
                                }
                            }
                            Some(Ok(WsMessage::Close(_))) | None => break,
                            Some(Ok(_)) => {}
                            Some(Err(err)) => {
                                tracing::warn!(error = %err, "socket read error");
                                break;
                            }
                        }
                    }
                }
            }

            let _ = state.send(ConnectionState::Disconnected);
            if closing.load(Ordering::Acquire) {
                return;
            }
            Self::backoff(attempt).await;
            attempt = attempt.saturating_add(1);
        }
    }

    async fn backoff(attempt: u32) {
        let base_ms = 250u64.saturating_mul(1u64 << attempt.min(6));
        let jitter_ms = rand::rng().random_range(0..=base_ms.max(1));
        tokio::time::sleep(Duration::from_millis(base_ms.min(10_000) + jitter_ms.min(1_000))).await;
    }
}

impl SocketSession for ClientSocket {
    fn send(&self, frame: Frame) -> BoxFuture<'_, Result<(), TransportError>> {
        let result = self
            .outbound
            .send(frame)
            .map_err(|_| TransportError::SocketClosed("client socket closed".into()));
        Box::pin(async move { result })
    }

    fn close(&self) -> BoxFuture<'_, ()> {
        self.closing.store(true, Ordering::Release);
        Box::pin(async move {})
    }
}

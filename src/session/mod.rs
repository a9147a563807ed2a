// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Socket session: the thing a dispatcher sends frames through and receives
//! frames from, independent of which side dialed the connection.

pub mod client_socket;
pub mod server_socket;

use std::future::Future;
use std::pin::Pin;

use crate::error::TransportError;
use crate::wire::Frame;

/// A future returned from a trait-object-safe async method. Hand-rolled
/// instead of pulling in a proc-macro crate for two methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One full-duplex, frame-addressed connection.
///
/// `send` enqueues and returns immediately — it never blocks on the
/// underlying socket; actual writes happen on a dedicated drain task owned
/// by the implementation.
pub trait SocketSession: Send + Sync {
    fn send(&self, frame: Frame) -> BoxFuture<'_, Result<(), TransportError>>;
    fn close(&self) -> BoxFuture<'_, ()>;
}

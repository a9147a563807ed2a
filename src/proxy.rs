// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Remote proxy: a handle to a server-side object whose id resolves
//! asynchronously, because construction (`NewObject`) is itself an RPC.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::watch;

use crate::client::ClientDispatcher;
use crate::error::TransportError;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum ObjectIdState {
    Pending,
    Ready(u64),
    Disposed,
}

/// Handle to a remote object. Method calls made before the owning
/// `NewObject` call resolves are queued behind the identity future and
/// issued in the order they were made; the unresolved id is never exposed
/// to callers. Calls made after [`RemoteProxy::dispose`] fail with
/// `ObjectDisposed` without reaching the wire.
pub struct RemoteProxy {
    interface: String,
    dispatcher: Arc<ClientDispatcher>,
    id_rx: watch::Receiver<ObjectIdState>,
}

impl RemoteProxy {
    pub(crate) fn new(
        interface: impl Into<String>,
        dispatcher: Arc<ClientDispatcher>,
        id_rx: watch::Receiver<ObjectIdState>,
    ) -> Self {
        Self {
            interface: interface.into(),
            dispatcher,
            id_rx,
        }
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    /// Resolve the object id, suspending until the originating `NewObject`
    /// call completes. Fails with `ObjectDisposed` if disposed meanwhile.
    async fn object_id(&self) -> Result<u64, TransportError> {
        let mut rx = self.id_rx.clone();
        loop {
            match *rx.borrow() {
                ObjectIdState::Ready(id) => return Ok(id),
                ObjectIdState::Disposed => {
                    return Err(TransportError::ObjectDisposed(0));
                }
                ObjectIdState::Pending => {}
            }
            if rx.changed().await.is_err() {
                return Err(TransportError::Closed);
            }
        }
    }

    /// Invoke a method returning a single value (`promise` return shape).
    pub async fn call_method(
        &self,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Value, TransportError> {
        let object_id = self.object_id().await?;
        self.dispatcher.call_method(object_id, method, args).await
    }

    /// Invoke a method that returns nothing (`void` return shape).
    pub async fn call_method_void(
        &self,
        method: &str,
        args: Vec<Value>,
    ) -> Result<(), TransportError> {
        let object_id = self.object_id().await?;
        self.dispatcher.call_method_void(object_id, method, args).await
    }

    /// Invoke a method returning a stream of values (`observable` return shape).
    pub async fn call_method_observable(
        &self,
        method: &str,
        args: Vec<Value>,
    ) -> Result<tokio::sync::mpsc::UnboundedReceiver<crate::client::StreamEvent>, TransportError> {
        let object_id = self.object_id().await?;
        self.dispatcher.subscribe_method(object_id, method, args).await
    }

    /// Dispose the remote object. Idempotent: a second call is a no-op.
    pub async fn dispose(&self) -> Result<(), TransportError> {
        let object_id = match self.object_id().await {
            Ok(id) => id,
            Err(TransportError::ObjectDisposed(_)) => return Ok(()),
            Err(other) => return Err(other),
        };
        self.dispatcher.dispose_object(object_id).await
    }
}

pub(crate) use ObjectIdState as ProxyIdState;

#[cfg(test)]
#[path = "proxy_tests.rs"]
mod tests;

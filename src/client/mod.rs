// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client dispatcher: issues requests over a [`crate::session::SocketSession`]
//! and correlates replies back to callers by request id.

mod rpc_table;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{watch, Mutex};

use crate::error::{RemoteError, TransportError};
use crate::proxy::{ProxyIdState, RemoteProxy};
use crate::session::SocketSession;
use crate::wire::{Frame, FrameBody, RequestBody, StreamResult};

pub use rpc_table::{PendingEntry, RpcTable, StreamEvent};

/// How a call's eventual outcome should be delivered.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReturnShape {
    Void,
    Promise,
    Observable,
}

/// Issues RPC calls against a single socket session and owns the pending
/// request table. Request ids are generated by a monotonic counter starting
/// at 1 and are never reused within this dispatcher's lifetime.
pub struct ClientDispatcher {
    session: Arc<dyn SocketSession>,
    next_id: AtomicU64,
    table: RpcTable,
    rpc_timeout: Duration,
    closed: AtomicBool,
    proxy_states: Mutex<HashMap<u64, watch::Sender<ProxyIdState>>>,
}

impl ClientDispatcher {
    pub fn new(session: Arc<dyn SocketSession>, rpc_timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            session,
            next_id: AtomicU64::new(1),
            table: RpcTable::new(),
            rpc_timeout,
            closed: AtomicBool::new(false),
            proxy_states: Mutex::new(HashMap::new()),
        })
    }

    fn next_request_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn ensure_open(&self) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) {
            Err(TransportError::Closed)
        } else {
            Ok(())
        }
    }

    async fn send(&self, frame: Frame) -> Result<(), TransportError> {
        self.session.send(frame).await
    }

    /// `void` return shape: enqueue and forget, no table entry. Queued by the
    /// session if the socket is currently down.
    pub async fn call_function_void(
        &self,
        function: &str,
        args: Vec<Value>,
    ) -> Result<(), TransportError> {
        self.ensure_open()?;
        let frame = Frame::new(
            Some(self.next_request_id()),
            FrameBody::Request(RequestBody::FunctionCall {
                function: function.to_string(),
                args,
            }),
        );
        self.send(frame).await
    }

    /// `promise` return shape: suspends until the first terminal reply or
    /// until `rpc_timeout` elapses.
    pub async fn call_function(
        &self,
        function: &str,
        args: Vec<Value>,
    ) -> Result<Value, TransportError> {
        self.ensure_open()?;
        let request_id = self.next_request_id();
        let rx = self.table.register_promise(request_id);
        let frame = Frame::new(
            Some(request_id),
            FrameBody::Request(RequestBody::FunctionCall {
                function: function.to_string(),
                args,
            }),
        );
        self.send(frame).await?;
        self.await_promise(request_id, rx).await
    }

    /// `observable` return shape: returns a stream sink; `next` pushes
    /// values, `completed`/`error` close it and remove the table entry. A
    /// timer guards the gap before the first frame arrives — disarmed as
    /// soon as any frame for this subscription is delivered.
    pub async fn subscribe_function(
        self: &Arc<Self>,
        function: &str,
        args: Vec<Value>,
    ) -> Result<tokio::sync::mpsc::UnboundedReceiver<StreamEvent>, TransportError> {
        self.ensure_open()?;
        let request_id = self.next_request_id();
        let (rx, armed) = self.table.register_observable(request_id);
        let frame = Frame::new(
            Some(request_id),
            FrameBody::Request(RequestBody::FunctionCall {
                function: function.to_string(),
                args,
            }),
        );
        self.send(frame).await?;
        self.arm_observable_timeout(request_id, armed);
        Ok(rx)
    }

    pub async fn call_method(
        &self,
        object_id: u64,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Value, TransportError> {
        self.ensure_open()?;
        let request_id = self.next_request_id();
        let rx = self.table.register_promise(request_id);
        let frame = Frame::new(
            Some(request_id),
            FrameBody::Request(RequestBody::MethodCall {
                object_id,
                method: method.to_string(),
                args,
            }),
        );
        self.send(frame).await?;
        self.await_promise(request_id, rx).await
    }

    pub async fn call_method_void(
        &self,
        object_id: u64,
        method: &str,
        args: Vec<Value>,
    ) -> Result<(), TransportError> {
        self.ensure_open()?;
        let frame = Frame::new(
            Some(self.next_request_id()),
            FrameBody::Request(RequestBody::MethodCall {
                object_id,
                method: method.to_string(),
                args,
            }),
        );
        self.send(frame).await
    }

    /// `observable` return shape on a method call: same stream semantics as
    /// [`ClientDispatcher::subscribe_function`].
    pub async fn subscribe_method(
        self: &Arc<Self>,
        object_id: u64,
        method: &str,
        args: Vec<Value>,
    ) -> Result<tokio::sync::mpsc::UnboundedReceiver<StreamEvent>, TransportError> {
        self.ensure_open()?;
        let request_id = self.next_request_id();
        let (rx, armed) = self.table.register_observable(request_id);
        let frame = Frame::new(
            Some(request_id),
            FrameBody::Request(RequestBody::MethodCall {
                object_id,
                method: method.to_string(),
                args,
            }),
        );
        self.send(frame).await?;
        self.arm_observable_timeout(request_id, armed);
        Ok(rx)
    }

    /// Create a remote object. The returned proxy's object id resolves
    /// asynchronously once the server replies.
    pub async fn create_object(
        self: &Arc<Self>,
        interface: &str,
        args: Vec<Value>,
    ) -> Result<RemoteProxy, TransportError> {
        self.ensure_open()?;
        let request_id = self.next_request_id();
        let rx = self.table.register_promise(request_id);
        let (id_tx, id_rx) = watch::channel(ProxyIdState::Pending);
        let frame = Frame::new(
            Some(request_id),
            FrameBody::Request(RequestBody::NewObject {
                interface: interface.to_string(),
                args,
            }),
        );
        self.send(frame).await?;

        let dispatcher = Arc::clone(self);
        let interface_owned = interface.to_string();
        tokio::spawn(async move {
            match dispatcher.await_promise(request_id, rx).await {
                Ok(value) => {
                    if let Some(object_id) = value.as_u64() {
                        dispatcher
                            .proxy_states
                            .lock()
                            .await
                            .insert(object_id, id_tx.clone());
                        let _ = id_tx.send(ProxyIdState::Ready(object_id));
                    } else {
                        let _ = id_tx.send(ProxyIdState::Disposed);
                    }
                }
                Err(_) => {
                    let _ = id_tx.send(ProxyIdState::Disposed);
                }
            }
        });

        Ok(RemoteProxy::new(interface_owned, Arc::clone(self), id_rx))
    }

    pub async fn dispose_object(&self, object_id: u64) -> Result<(), TransportError> {
        self.ensure_open()?;
        let request_id = self.next_request_id();
        let rx = self.table.register_promise(request_id);
        let frame = Frame::new(
            Some(request_id),
            FrameBody::Request(RequestBody::DisposeObject { object_id }),
        );
        self.send(frame).await?;
        self.await_promise(request_id, rx).await?;
        if let Some(sender) = self.proxy_states.lock().await.remove(&object_id) {
            let _ = sender.send(ProxyIdState::Disposed);
        }
        Ok(())
    }

    /// Cancel an observable subscription: sends `DisposeObservable` and
    /// removes the local table entry immediately. Frames that arrive
    /// between the send and the server observing it are dropped locally by
    /// [`RpcTable::remove`] having already run.
    pub async fn unsubscribe(&self, request_id: u64) -> Result<(), TransportError> {
        self.table.remove(request_id);
        let frame = Frame::new(
            Some(request_id),
            FrameBody::Request(RequestBody::DisposeObservable {}),
        );
        self.send(frame).await
    }

    /// Spawn the no-first-frame timeout for a freshly registered observable.
    /// If `armed` is still set once `rpc_timeout` elapses, the subscription
    /// is failed locally with `Timeout` and the table entry removed.
    fn arm_observable_timeout(self: &Arc<Self>, request_id: u64, armed: Arc<AtomicBool>) {
        let dispatcher = Arc::clone(self);
        let timeout = self.rpc_timeout;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if armed.load(Ordering::Acquire) {
                dispatcher
                    .table
                    .fail_stream_if_still_armed(request_id, TransportError::Timeout(request_id).to_remote_error());
            }
        });
    }

    async fn await_promise(
        &self,
        request_id: u64,
        rx: tokio::sync::oneshot::Receiver<Result<Value, RemoteError>>,
    ) -> Result<Value, TransportError> {
        let outcome = tokio::time::timeout(self.rpc_timeout, rx).await;
        match outcome {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(remote))) => Err(TransportError::HandlerError {
                message: remote.message,
                code: remote.code,
                stack: remote.stack,
            }),
            Ok(Err(_canceled)) => Err(TransportError::Closed),
            Err(_elapsed) => {
                self.table.remove(request_id);
                Err(TransportError::Timeout(request_id))
            }
        }
    }

    /// Route one inbound frame to the table entry it corresponds to. Late
    /// frames for an already-removed entry are dropped with a warning.
    pub fn handle_inbound(&self, frame: Frame) {
        let Some(request_id) = frame.request_id else {
            tracing::warn!("inbound frame missing requestId, dropping");
            return;
        };
        match frame.body {
            FrameBody::Response {
                had_error,
                result,
                error,
            } => {
                let outcome = if had_error {
                    Err(error.unwrap_or(RemoteError {
                        message: "unknown error".into(),
                        code: None,
                        stack: None,
                    }))
                } else {
                    Ok(result.unwrap_or(Value::Null))
                };
                self.table.resolve_promise(request_id, outcome);
            }
            FrameBody::Stream {
                had_error,
                error,
                result,
            } => {
                if had_error == Some(true) {
                    let remote = error.unwrap_or(RemoteError {
                        message: "unknown stream error".into(),
                        code: None,
                        stack: None,
                    });
                    self.table.fail_stream(request_id, remote);
                } else if let Some(result) = result {
                    match result {
                        StreamResult::Next { data } => {
                            self.table.push_stream(request_id, data);
                        }
                        StreamResult::Completed => {
                            self.table.complete_stream(request_id);
                        }
                    }
                }
            }
            FrameBody::Request(_) => {
                tracing::warn!(request_id, "client dispatcher received a request frame");
            }
        }
    }

    /// Reject all pending promises with `Closed` and close all live streams.
    /// Called on explicit close, not on a mere socket drop (which instead
    /// surfaces as per-request `Timeout` once the RPC timeout elapses).
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.table.close_all();
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Server dispatcher: the callee-side surface. Receives requests, looks up
//! the target, invokes the handler, streams or returns results, tracks
//! per-client live objects and subscriptions, and tears them down on
//! disconnect.

pub mod client_session;
pub mod table;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::client::ReturnShape;
use crate::error::{RemoteError, TransportError};
use crate::registry::TypeRegistry;
use crate::session::SocketSession;
use crate::wire::{Frame, RequestBody};

pub use client_session::{ClientSession, LiveObject};
pub use table::{
    Constructor, Disposer, FnObservable, FnPromise, FnVoid, FunctionHandler, InterfaceEntry,
    MethodHandler, MethodObservable, MethodPromise, MethodVoid, ObjectHandle, ServiceTable,
    ServiceTableBuilder, StreamItem,
};

/// Default idle-socket retention window before a client session's live
/// objects and subscriptions are garbage-collected. Five minutes is a
/// bounded default chosen in the absence of any better signal for how long
/// a socket-less session deserves to be kept around (see DESIGN.md).
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Server-side RPC surface: one instance per listener, shared across every
/// accepted connection.
pub struct ServerDispatcher {
    services: Arc<ServiceTable>,
    types: Arc<TypeRegistry>,
    clients: RwLock<HashMap<String, Arc<ClientSession>>>,
    next_object_id: AtomicU64,
    idle_timeout: Duration,
}

impl ServerDispatcher {
    pub fn new(services: Arc<ServiceTable>, types: Arc<TypeRegistry>) -> Arc<Self> {
        Self::with_idle_timeout(services, types, DEFAULT_IDLE_TIMEOUT)
    }

    pub fn with_idle_timeout(
        services: Arc<ServiceTable>,
        types: Arc<TypeRegistry>,
        idle_timeout: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            services,
            types,
            clients: RwLock::new(HashMap::new()),
            next_object_id: AtomicU64::new(1),
            idle_timeout,
        })
    }

    /// Look up or create the named client's session. Used both by the
    /// handshake (to attach a fresh socket) and to keep it alive across an
    /// idle-timeout sweep decision.
    pub async fn client(&self, client_id: &str) -> Arc<ClientSession> {
        if let Some(existing) = self.clients.read().await.get(client_id) {
            return Arc::clone(existing);
        }
        let mut clients = self.clients.write().await;
        Arc::clone(
            clients
                .entry(client_id.to_string())
                .or_insert_with(|| ClientSession::new(client_id)),
        )
    }

    /// Attach a newly accepted socket to the named client's session,
    /// creating the session if this is the first time we've seen the id.
    /// This is the reconnect contract: the previous socket is closed but
    /// the session's live objects, subscriptions, and queued frames survive.
    pub async fn attach_socket(&self, client_id: &str, socket: Arc<dyn SocketSession>) -> Arc<ClientSession> {
        let session = self.client(client_id).await;
        session.attach(socket).await;
        session
    }

    /// Called when a connection drops without an explicit client-level
    /// close — the session survives, only the socket goes away.
    pub async fn detach_socket(&self, client_id: &str) {
        if let Some(session) = self.clients.read().await.get(client_id) {
            session.mark_detached().await;
        }
    }

    /// Tear down a client entirely: cancel subscriptions, dispose objects
    /// LIFO, and forget the session. Called on explicit close, not a mere
    /// socket drop.
    pub async fn teardown_client(&self, client_id: &str) {
        let session = self.clients.write().await.remove(client_id);
        if let Some(session) = session {
            session.teardown().await;
        }
    }

    /// Background sweep: evict client sessions whose socket has been
    /// absent for longer than `idle_timeout`.
    pub async fn sweep_idle_clients(&self) {
        let mut stale = Vec::new();
        for (id, session) in self.clients.read().await.iter() {
            if let Some(since) = session.is_idle_since().await {
                if since.elapsed() >= self.idle_timeout {
                    stale.push(id.clone());
                }
            }
        }
        for id in stale {
            tracing::info!(client_id = %id, "evicting idle client session");
            self.teardown_client(&id).await;
        }
    }

    pub fn spawn_idle_sweep(self: &Arc<Self>) {
        let dispatcher = Arc::clone(self);
        let period = (self.idle_timeout / 4).max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(period);
            loop {
                tick.tick().await;
                dispatcher.sweep_idle_clients().await;
            }
        });
    }

    /// Dispatch one inbound frame from `client_id`. This is the single
    /// entry point the per-connection read loop calls for every parsed
    /// frame.
    pub async fn dispatch(&self, client_id: &str, frame: Frame) {
        if !frame.is_recognized() {
            tracing::warn!(client_id, "ignoring frame with unrecognized protocol/channel");
            return;
        }
        let crate::wire::FrameBody::Request(body) = frame.body else {
            tracing::warn!(client_id, "server dispatcher received a non-request frame");
            return;
        };
        let session = self.client(client_id).await;
        let request_id = frame.request_id;

        match body {
            RequestBody::FunctionCall { function, args } => {
                self.dispatch_function(&session, request_id, &function, args).await;
            }
            RequestBody::MethodCall { object_id, method, args } => {
                self.dispatch_method(&session, request_id, object_id, &method, args).await;
            }
            RequestBody::NewObject { interface, args } => {
                self.dispatch_new_object(&session, request_id, &interface, args).await;
            }
            RequestBody::DisposeObject { object_id } => {
                self.dispatch_dispose_object(&session, request_id, object_id).await;
            }
            RequestBody::DisposeObservable {} => {
                if let Some(request_id) = request_id {
                    session.cancel_subscription(request_id).await;
                }
            }
        }
    }

    async fn dispatch_function(
        &self,
        session: &Arc<ClientSession>,
        request_id: Option<u64>,
        name: &str,
        args: Vec<Value>,
    ) {
        let Some(handler) = self.services.function(name) else {
            self.reply_unknown_service(session, request_id, name).await;
            return;
        };
        match handler.clone() {
            FunctionHandler::Void(f) => {
                tokio::spawn(f(args));
            }
            FunctionHandler::Promise(f) => {
                let Some(request_id) = request_id else {
                    tokio::spawn(f(args));
                    return;
                };
                let session = Arc::clone(session);
                tokio::spawn(async move {
                    let outcome = f(args).await;
                    let reply = match outcome {
                        Ok(value) => Frame::response_ok(request_id, value),
                        Err(error) => Frame::response_err(request_id, error),
                    };
                    let _ = session.send(reply).await;
                });
            }
            FunctionHandler::Observable(f) => {
                let Some(request_id) = request_id else {
                    tokio::spawn(f(args));
                    return;
                };
                self.spawn_observable(Arc::clone(session), request_id, f(args)).await;
            }
        }
    }

    async fn dispatch_method(
        &self,
        session: &Arc<ClientSession>,
        request_id: Option<u64>,
        object_id: u64,
        method: &str,
        args: Vec<Value>,
    ) {
        let Some(interface) = session.object_interface(object_id).await else {
            self.reply_object_disposed(session, request_id, object_id).await;
            return;
        };
        let Some(entry) = self.services.interface(&interface) else {
            self.reply_unknown_service(session, request_id, &interface).await;
            return;
        };
        let Some(handler) = entry.methods.get(method).cloned() else {
            self.reply_unknown_method(session, request_id, &interface, method).await;
            return;
        };
        let Some(handle) = session.object_handle(object_id).await else {
            self.reply_object_disposed(session, request_id, object_id).await;
            return;
        };

        match handler {
            MethodHandler::Void(f) => {
                tokio::spawn(f(handle, args));
            }
            MethodHandler::Promise(f) => {
                let Some(request_id) = request_id else {
                    tokio::spawn(f(handle, args));
                    return;
                };
                let session = Arc::clone(session);
                tokio::spawn(async move {
                    let outcome = f(handle, args).await;
                    let reply = match outcome {
                        Ok(value) => Frame::response_ok(request_id, value),
                        Err(error) => Frame::response_err(request_id, error),
                    };
                    let _ = session.send(reply).await;
                });
            }
            MethodHandler::Observable(f) => {
                let Some(request_id) = request_id else {
                    tokio::spawn(f(handle, args));
                    return;
                };
                self.spawn_observable(Arc::clone(session), request_id, f(handle, args)).await;
            }
        }
    }

    async fn dispatch_new_object(
        &self,
        session: &Arc<ClientSession>,
        request_id: Option<u64>,
        interface: &str,
        args: Vec<Value>,
    ) {
        let Some(entry) = self.services.interface(interface) else {
            self.reply_unknown_service(session, request_id, interface).await;
            return;
        };
        let Some(constructor) = entry.constructor.clone() else {
            self.reply_unknown_service(session, request_id, interface).await;
            return;
        };
        let Some(request_id) = request_id else {
            tokio::spawn(constructor(args));
            return;
        };
        let session = Arc::clone(session);
        let interface = interface.to_string();
        let object_id = self.next_object_id.fetch_add(1, Ordering::Relaxed);
        tokio::spawn(async move {
            let reply = match constructor(args).await {
                Ok((handle, disposer)) => {
                    session
                        .insert_object(
                            object_id,
                            LiveObject { interface, handle, disposer },
                        )
                        .await;
                    Frame::response_ok(request_id, Value::from(object_id))
                }
                Err(error) => Frame::response_err(request_id, error),
            };
            let _ = session.send(reply).await;
        });
    }

    async fn dispatch_dispose_object(
        &self,
        session: &Arc<ClientSession>,
        request_id: Option<u64>,
        object_id: u64,
    ) {
        session.dispose_object(object_id).await;
        if let Some(request_id) = request_id {
            let _ = session.send(Frame::response_ok(request_id, Value::Null)).await;
        }
    }

    async fn spawn_observable(
        &self,
        session: Arc<ClientSession>,
        request_id: u64,
        stream: impl std::future::Future<Output = tokio::sync::mpsc::UnboundedReceiver<StreamItem>>
            + Send
            + 'static,
    ) {
        let cancel = CancellationToken::new();
        session.register_subscription(request_id, cancel.clone()).await;
        tokio::spawn(async move {
            let mut rx = stream.await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    item = rx.recv() => {
                        match item {
                            Some(StreamItem::Next(value)) => {
                                if session.send(Frame::stream_next(request_id, value)).await.is_err() {
                                    break;
                                }
                            }
                            Some(StreamItem::Completed) | None => {
                                let _ = session.send(Frame::stream_completed(request_id)).await;
                                break;
                            }
                            Some(StreamItem::Error(error)) => {
                                let _ = session.send(Frame::stream_error(request_id, error)).await;
                                break;
                            }
                        }
                    }
                }
            }
            session.unregister_subscription(request_id).await;
        });
    }

    async fn reply_unknown_service(&self, session: &Arc<ClientSession>, request_id: Option<u64>, name: &str) {
        if let Some(request_id) = request_id {
            let error = TransportError::UnknownService(name.to_string()).to_remote_error();
            let _ = session.send(Frame::response_err(request_id, error)).await;
        }
        tracing::warn!(client_id = %session.id, name, "unknown service");
    }

    async fn reply_unknown_method(
        &self,
        session: &Arc<ClientSession>,
        request_id: Option<u64>,
        interface: &str,
        method: &str,
    ) {
        if let Some(request_id) = request_id {
            let error = TransportError::UnknownMethod {
                interface: interface.to_string(),
                method: method.to_string(),
            }
            .to_remote_error();
            let _ = session.send(Frame::response_err(request_id, error)).await;
        }
    }

    async fn reply_object_disposed(&self, session: &Arc<ClientSession>, request_id: Option<u64>, object_id: u64) {
        if let Some(request_id) = request_id {
            let error = TransportError::ObjectDisposed(object_id).to_remote_error();
            let _ = session.send(Frame::response_err(request_id, error)).await;
        }
    }

    pub fn types(&self) -> &Arc<TypeRegistry> {
        &self.types
    }

    pub fn services(&self) -> &Arc<ServiceTable> {
        &self.services
    }
}

/// Marshal a value's declared return shape; `_shape` is accepted for call
/// sites that branch on it but the registry call itself is shape-agnostic.
pub async fn marshal_result(
    types: &TypeRegistry,
    type_name: &str,
    _shape: ReturnShape,
    value: &Value,
) -> Result<Value, TransportError> {
    types.marshal(type_name, value).await
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;

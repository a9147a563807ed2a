// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Server-side per-client state: outlives individual sockets. Keyed by the
//! opaque client identifier the client chooses and resends on every
//! reconnect.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use indexmap::IndexMap;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::error::TransportError;
use crate::server::table::{Disposer, ObjectHandle};
use crate::session::SocketSession;
use crate::wire::Frame;

pub struct LiveObject {
    pub interface: String,
    pub handle: ObjectHandle,
    pub disposer: Option<Disposer>,
}

/// One logical client: live objects, live subscriptions, and an outbound
/// queue that survives socket churn.
///
/// Mutation of this client's registries happens under `inner`'s lock only;
/// no cross-client lock is ever held at the same time.
pub struct ClientSession {
    pub id: String,
    inner: Mutex<Inner>,
}

struct Inner {
    socket: Option<Arc<dyn SocketSession>>,
    outbound: VecDeque<Frame>,
    /// Insertion-ordered so server teardown can dispose in LIFO.
    objects: IndexMap<u64, LiveObject>,
    subscriptions: std::collections::HashMap<u64, CancellationToken>,
    disconnected_since: Option<Instant>,
}

impl ClientSession {
    pub fn new(id: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            inner: Mutex::new(Inner {
                socket: None,
                outbound: VecDeque::new(),
                objects: IndexMap::new(),
                subscriptions: std::collections::HashMap::new(),
                disconnected_since: Some(Instant::now()),
            }),
        })
    }

    /// Attach a freshly accepted socket. Closes any previous socket (the
    /// session itself survives) and flushes queued frames in order.
    pub async fn attach(&self, socket: Arc<dyn SocketSession>) {
        let mut inner = self.inner.lock().await;
        if let Some(old) = inner.socket.take() {
            old.close().await;
        }
        inner.disconnected_since = None;
        while let Some(frame) = inner.outbound.pop_front() {
            if socket.send(frame).await.is_err() {
                break;
            }
        }
        inner.socket = Some(socket);
    }

    pub async fn mark_detached(&self) {
        let mut inner = self.inner.lock().await;
        inner.socket = None;
        inner.disconnected_since = Some(Instant::now());
    }

    /// Best-effort send: forwards immediately if a socket is attached,
    /// otherwise holds the frame for the next attach.
    pub async fn send(&self, frame: Frame) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().await;
        if let Some(socket) = inner.socket.clone() {
            if socket.send(frame.clone()).await.is_ok() {
                return Ok(());
            }
        }
        inner.outbound.push_back(frame);
        Ok(())
    }

    pub async fn insert_object(&self, object_id: u64, object: LiveObject) {
        self.inner.lock().await.objects.insert(object_id, object);
    }

    pub async fn object_interface(&self, object_id: u64) -> Option<String> {
        self.inner
            .lock()
            .await
            .objects
            .get(&object_id)
            .map(|o| o.interface.clone())
    }

    pub async fn object_handle(&self, object_id: u64) -> Option<ObjectHandle> {
        self.inner.lock().await.objects.get(&object_id).map(|o| o.handle.clone())
    }

    /// Remove and dispose one object. Idempotent: returns `false` if the
    /// object was already gone.
    pub async fn dispose_object(&self, object_id: u64) -> bool {
        let removed = self.inner.lock().await.objects.shift_remove(&object_id);
        match removed {
            Some(live) => {
                if let Some(disposer) = live.disposer {
                    disposer(live.handle).await;
                }
                true
            }
            None => false,
        }
    }

    pub async fn register_subscription(&self, request_id: u64, cancel: CancellationToken) {
        self.inner.lock().await.subscriptions.insert(request_id, cancel);
    }

    pub async fn cancel_subscription(&self, request_id: u64) {
        if let Some(cancel) = self.inner.lock().await.subscriptions.remove(&request_id) {
            cancel.cancel();
        }
    }

    pub async fn unregister_subscription(&self, request_id: u64) {
        self.inner.lock().await.subscriptions.remove(&request_id);
    }

    pub async fn is_idle_since(&self) -> Option<Instant> {
        self.inner.lock().await.disconnected_since
    }

    /// Tear down every live object (LIFO) and cancel every live subscription.
    /// Called on explicit close, idle-timeout eviction, or unrecoverable
    /// error — never on a mere socket drop.
    pub async fn teardown(&self) {
        let mut inner = self.inner.lock().await;
        if let Some(socket) = inner.socket.take() {
            socket.close().await;
        }
        for (_, cancel) in inner.subscriptions.drain() {
            cancel.cancel();
        }
        while let Some((_, live)) = inner.objects.pop() {
            if let Some(disposer) = live.disposer {
                disposer(live.handle).await;
            }
        }
    }
}

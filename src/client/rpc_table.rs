// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client-side RPC table: requestId -> pending outcome delivery.
//!
//! Modeled after the request-id-keyed pending map used by reconnecting RPC
//! clients throughout the wider ecosystem (a `BTreeMap<u64, InFlight>` in the
//! style of a JSON-RPC-over-WebSocket request manager) — entries are removed
//! the instant their terminal outcome is delivered, so a late frame for an
//! already-resolved or already-timed-out request finds nothing and is
//! dropped by the caller.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use crate::error::RemoteError;

pub enum PendingEntry {
    Promise(oneshot::Sender<Result<Value, RemoteError>>),
    Observable(mpsc::UnboundedSender<StreamEvent>, Arc<AtomicBool>),
}

#[derive(Debug, Clone)]
pub enum StreamEvent {
    Next(Value),
    Completed,
    Error(RemoteError),
}

#[derive(Default)]
pub struct RpcTable {
    entries: Mutex<HashMap<u64, PendingEntry>>,
}

impl RpcTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_promise(&self, request_id: u64) -> oneshot::Receiver<Result<Value, RemoteError>> {
        let (tx, rx) = oneshot::channel();
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(request_id, PendingEntry::Promise(tx));
        rx
    }

    /// Registers a stream entry and returns its receiver plus an "armed"
    /// flag the caller uses to fire a timeout if no first frame ever
    /// arrives. The flag is shared with this table: [`RpcTable::push_stream`],
    /// [`RpcTable::complete_stream`], and [`RpcTable::fail_stream`] all
    /// disarm it, since the timer only guards the gap before the first frame.
    pub fn register_observable(&self, request_id: u64) -> (mpsc::UnboundedReceiver<StreamEvent>, Arc<AtomicBool>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let armed = Arc::new(AtomicBool::new(true));
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(request_id, PendingEntry::Observable(tx, Arc::clone(&armed)));
        (rx, armed)
    }

    /// Fire the no-first-frame timeout for `request_id` if it is still armed
    /// (i.e. no frame has arrived for it yet). A no-op if the entry already
    /// resolved or was removed.
    pub fn fail_stream_if_still_armed(&self, request_id: u64, error: RemoteError) {
        let should_fire = match self
            .entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&request_id)
        {
            Some(PendingEntry::Observable(_, armed)) => armed.swap(false, Ordering::AcqRel),
            _ => false,
        };
        if should_fire {
            if let Some(PendingEntry::Observable(tx, _)) = self.remove(request_id) {
                let _ = tx.send(StreamEvent::Error(error));
            }
        }
    }

    pub fn remove(&self, request_id: u64) -> Option<PendingEntry> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&request_id)
    }

    pub fn resolve_promise(&self, request_id: u64, outcome: Result<Value, RemoteError>) {
        if let Some(PendingEntry::Promise(tx)) = self.remove(request_id) {
            let _ = tx.send(outcome);
        } else {
            tracing::warn!(request_id, "dropping late reply for unknown request");
        }
    }

    pub fn push_stream(&self, request_id: u64, value: Value) {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        match entries.get(&request_id) {
            Some(PendingEntry::Observable(tx, armed)) => {
                armed.store(false, Ordering::Release);
                let _ = tx.send(StreamEvent::Next(value));
            }
            _ => tracing::warn!(request_id, "dropping late stream frame for unknown subscription"),
        }
    }

    pub fn complete_stream(&self, request_id: u64) {
        if let Some(PendingEntry::Observable(tx, armed)) = self.remove(request_id) {
            armed.store(false, Ordering::Release);
            let _ = tx.send(StreamEvent::Completed);
        }
    }

    pub fn fail_stream(&self, request_id: u64, error: RemoteError) {
        if let Some(PendingEntry::Observable(tx, armed)) = self.remove(request_id) {
            armed.store(false, Ordering::Release);
            let _ = tx.send(StreamEvent::Error(error));
        } else {
            tracing::warn!(request_id, "dropping late stream error for unknown subscription");
        }
    }

    pub fn close_all(&self) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        for (_, entry) in entries.drain() {
            match entry {
                PendingEntry::Promise(tx) => {
                    let _ = tx.send(Err(RemoteError {
                        message: "dispatcher closed".into(),
                        code: Some("CLOSED".into()),
                        stack: None,
                    }));
                }
                PendingEntry::Observable(tx, armed) => {
                    armed.store(false, Ordering::Release);
                    let _ = tx.send(StreamEvent::Error(RemoteError {
                        message: "dispatcher closed".into(),
                        code: Some("CLOSED".into()),
                        stack: None,
                    }));
                }
            }
        }
    }
}

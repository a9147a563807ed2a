// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Service table: the callee-side registry of free functions, interface
//! constructors, and interface methods a schema declares. Handler closures
//! are registered by the embedding service (filesystem access, VCS queries,
//! and the rest of the business logic live outside this crate) against
//! names the schema already declared; dispatch never invents a name on the
//! fly.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;

use crate::client::ReturnShape;
use crate::error::{RemoteError, TransportError};
use crate::schema::Schema;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A live server-side object, type-erased so the dispatcher doesn't need to
/// know concrete service types.
pub type ObjectHandle = Arc<dyn Any + Send + Sync>;

/// One event produced by an `observable` handler.
#[derive(Debug, Clone)]
pub enum StreamItem {
    Next(Value),
    Completed,
    Error(RemoteError),
}

pub type FnVoid = Arc<dyn Fn(Vec<Value>) -> BoxFuture<'static, ()> + Send + Sync>;
pub type FnPromise =
    Arc<dyn Fn(Vec<Value>) -> BoxFuture<'static, Result<Value, RemoteError>> + Send + Sync>;
pub type FnObservable =
    Arc<dyn Fn(Vec<Value>) -> BoxFuture<'static, mpsc::UnboundedReceiver<StreamItem>> + Send + Sync>;

pub type MethodVoid = Arc<dyn Fn(ObjectHandle, Vec<Value>) -> BoxFuture<'static, ()> + Send + Sync>;
pub type MethodPromise = Arc<
    dyn Fn(ObjectHandle, Vec<Value>) -> BoxFuture<'static, Result<Value, RemoteError>> + Send + Sync,
>;
pub type MethodObservable = Arc<
    dyn Fn(ObjectHandle, Vec<Value>) -> BoxFuture<'static, mpsc::UnboundedReceiver<StreamItem>>
        + Send
        + Sync,
>;

pub type Constructor = Arc<
    dyn Fn(Vec<Value>) -> BoxFuture<'static, Result<(ObjectHandle, Option<Disposer>), RemoteError>>
        + Send
        + Sync,
>;
pub type Disposer = Arc<dyn Fn(ObjectHandle) -> BoxFuture<'static, ()> + Send + Sync>;

/// A registered free-function handler, carrying the return shape it was
/// declared with so dispatch knows whether to reply at all.
#[derive(Clone)]
pub enum FunctionHandler {
    Void(FnVoid),
    Promise(FnPromise),
    Observable(FnObservable),
}

#[derive(Clone)]
pub enum MethodHandler {
    Void(MethodVoid),
    Promise(MethodPromise),
    Observable(MethodObservable),
}

#[derive(Clone)]
pub struct InterfaceEntry {
    pub return_shape_by_method: HashMap<String, ReturnShape>,
    pub constructor: Option<Constructor>,
    pub methods: HashMap<String, MethodHandler>,
}

/// Declared-but-not-yet-registered function slot: known from the schema,
/// handler attached later via [`ServiceTableBuilder::register_function`].
struct FunctionSlot {
    handler: Option<FunctionHandler>,
}

struct InterfaceSlot {
    constructor: Option<Constructor>,
    method_shapes: HashMap<String, ReturnShape>,
    methods: HashMap<String, MethodHandler>,
}

/// Builder used once at startup: schema declarations seed the known names,
/// then the embedding service attaches handlers before `build()` freezes the
/// table into its immutable, lock-free-readable form.
pub struct ServiceTableBuilder {
    functions: HashMap<String, FunctionSlot>,
    interfaces: HashMap<String, InterfaceSlot>,
}

impl ServiceTableBuilder {
    pub fn from_schema(schema: &Schema) -> Self {
        let mut functions = HashMap::new();
        for f in &schema.functions {
            functions.insert(f.name.clone(), FunctionSlot { handler: None });
        }
        let mut interfaces = HashMap::new();
        for i in &schema.interfaces {
            let method_shapes = i.methods.iter().map(|m| (m.name.clone(), m.returns)).collect();
            interfaces.insert(
                i.name.clone(),
                InterfaceSlot {
                    constructor: None,
                    method_shapes,
                    methods: HashMap::new(),
                },
            );
        }
        Self { functions, interfaces }
    }

    pub fn register_function(
        &mut self,
        name: &str,
        handler: FunctionHandler,
    ) -> Result<(), TransportError> {
        let slot = self
            .functions
            .get_mut(name)
            .ok_or_else(|| TransportError::UnknownService(name.to_string()))?;
        slot.handler = Some(handler);
        Ok(())
    }

    pub fn register_constructor(
        &mut self,
        interface: &str,
        constructor: Constructor,
    ) -> Result<(), TransportError> {
        let slot = self
            .interfaces
            .get_mut(interface)
            .ok_or_else(|| TransportError::UnknownService(interface.to_string()))?;
        slot.constructor = Some(constructor);
        Ok(())
    }

    pub fn register_method(
        &mut self,
        interface: &str,
        method: &str,
        handler: MethodHandler,
    ) -> Result<(), TransportError> {
        let slot = self
            .interfaces
            .get_mut(interface)
            .ok_or_else(|| TransportError::UnknownService(interface.to_string()))?;
        if !slot.method_shapes.contains_key(method) {
            return Err(TransportError::UnknownMethod {
                interface: interface.to_string(),
                method: method.to_string(),
            });
        }
        slot.methods.insert(method.to_string(), handler);
        Ok(())
    }

    pub fn build(self) -> ServiceTable {
        let functions = self
            .functions
            .into_iter()
            .filter_map(|(name, slot)| slot.handler.map(|h| (name, h)))
            .collect();
        let interfaces = self
            .interfaces
            .into_iter()
            .map(|(name, slot)| {
                (
                    name,
                    InterfaceEntry {
                        return_shape_by_method: slot.method_shapes,
                        constructor: slot.constructor,
                        methods: slot.methods,
                    },
                )
            })
            .collect();
        ServiceTable { functions, interfaces }
    }
}

/// Immutable, shared service table: written once by
/// [`ServiceTableBuilder`], read concurrently by every client connection
/// thereafter with no locking (same resource rule as [`crate::registry::TypeRegistry`]).
pub struct ServiceTable {
    functions: HashMap<String, FunctionHandler>,
    interfaces: HashMap<String, InterfaceEntry>,
}

impl ServiceTable {
    pub fn function(&self, name: &str) -> Option<&FunctionHandler> {
        self.functions.get(name)
    }

    pub fn interface(&self, name: &str) -> Option<&InterfaceEntry> {
        self.interfaces.get(name)
    }
}

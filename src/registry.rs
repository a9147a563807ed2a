// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Type registry: name -> marshal/unmarshal pair.
//!
//! Registration happens once, at schema-load time, before the listener
//! binds; the registry is append-only and lock-free-readable after that.
//! Every lookup past startup is a plain `RwLock::read`.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::TransportError;

pub type MarshalFn = Arc<dyn Fn(&Value) -> Result<Value, TransportError> + Send + Sync>;
pub type UnmarshalFn = Arc<dyn Fn(&Value) -> Result<Value, TransportError> + Send + Sync>;

#[derive(Clone)]
pub struct TypeEntry {
    pub marshal: MarshalFn,
    pub unmarshal: UnmarshalFn,
}

impl std::fmt::Debug for TypeEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeEntry").finish_non_exhaustive()
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Slot {
    Owned,
    Alias,
}

/// Name -> {marshal, unmarshal} registry, with alias-forwarding.
///
/// An alias registration forwards lookups to a previously-registered target
/// name; it does not copy the target's functions, so re-registering the
/// target later is also visible through the alias.
#[derive(Default)]
pub struct TypeRegistry {
    entries: RwLock<HashMap<String, TypeEntry>>,
    aliases: RwLock<HashMap<String, String>>,
    slots: RwLock<HashMap<String, Slot>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    async fn claim(&self, name: &str, slot: Slot) -> Result<(), TransportError> {
        let mut slots = self.slots.write().await;
        if slots.contains_key(name) {
            return Err(TransportError::DuplicateTypeRegistration(name.to_string()));
        }
        slots.insert(name.to_string(), slot);
        Ok(())
    }

    /// Register a named type. `DuplicateTypeRegistration`-equivalent error if
    /// `name` was already registered (directly or as an alias).
    pub async fn register(
        &self,
        name: impl Into<String>,
        marshal: MarshalFn,
        unmarshal: UnmarshalFn,
    ) -> Result<(), TransportError> {
        let name = name.into();
        self.claim(&name, Slot::Owned).await?;
        self.entries.write().await.insert(name, TypeEntry { marshal, unmarshal });
        Ok(())
    }

    /// Register `name` as forwarding to `target`. `target` need not exist yet.
    pub async fn register_alias(
        &self,
        name: impl Into<String>,
        target: impl Into<String>,
    ) -> Result<(), TransportError> {
        let name = name.into();
        self.claim(&name, Slot::Alias).await?;
        self.aliases.write().await.insert(name, target.into());
        Ok(())
    }

    /// Resolve `name` through any alias chain to the owning entry, if one is
    /// registered.
    pub async fn resolve(&self, name: &str) -> Option<TypeEntry> {
        let mut current = name.to_string();
        let aliases = self.aliases.read().await;
        let mut hops = 0;
        while let Some(target) = aliases.get(&current) {
            current = target.clone();
            hops += 1;
            if hops > 32 {
                return None;
            }
        }
        self.entries.read().await.get(&current).cloned()
    }

    pub async fn marshal(&self, name: &str, value: &Value) -> Result<Value, TransportError> {
        match self.resolve(name).await {
            Some(entry) => (entry.marshal)(value),
            None => Err(TransportError::UnknownService(name.to_string())),
        }
    }

    pub async fn unmarshal(&self, name: &str, value: &Value) -> Result<Value, TransportError> {
        match self.resolve(name).await {
            Some(entry) => (entry.unmarshal)(value),
            None => Err(TransportError::UnknownService(name.to_string())),
        }
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;

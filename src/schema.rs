// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Service schema: the startup-time description of every free function,
//! interface, and alias the server exposes, as produced by the (out of
//! scope) schema-parsing tooling upstream of this crate.
//!
//! Loading a schema populates the [`crate::registry::TypeRegistry`] (for
//! `alias`/`interface` type entries) and the [`crate::server::ServiceTable`]
//! shape (return shapes per function/method), ahead of handler registration.

use serde::Deserialize;

use crate::client::ReturnShape;
use crate::error::TransportError;

/// One entry in the schema document's top-level array.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SchemaEntry {
    Alias { name: String, target: String },
    Interface {
        name: String,
        #[serde(default)]
        constructor_args: Vec<String>,
        #[serde(default)]
        methods: Vec<MethodDecl>,
    },
    Function {
        name: String,
        #[serde(default)]
        args: Vec<String>,
        returns: String,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct MethodDecl {
    pub name: String,
    #[serde(default)]
    pub args: Vec<String>,
    pub returns: String,
}

#[derive(Debug, Clone)]
pub struct AliasDecl {
    pub name: String,
    pub target: String,
}

#[derive(Debug, Clone)]
pub struct FunctionDecl {
    pub name: String,
    pub args: Vec<String>,
    pub returns: ReturnShape,
}

#[derive(Debug, Clone)]
pub struct InterfaceDecl {
    pub name: String,
    pub constructor_args: Vec<String>,
    pub methods: Vec<MethodSig>,
}

#[derive(Debug, Clone)]
pub struct MethodSig {
    pub name: String,
    pub args: Vec<String>,
    pub returns: ReturnShape,
}

/// The parsed, in-memory form of the schema document.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    pub aliases: Vec<AliasDecl>,
    pub interfaces: Vec<InterfaceDecl>,
    pub functions: Vec<FunctionDecl>,
}

impl Schema {
    /// Parse the schema document: a JSON array of `{kind, ...}` entries.
    pub fn parse(text: &str) -> Result<Self, TransportError> {
        let entries: Vec<SchemaEntry> =
            serde_json::from_str(text).map_err(TransportError::MalformedFrame)?;
        let mut schema = Schema::default();
        for entry in entries {
            match entry {
                SchemaEntry::Alias { name, target } => {
                    schema.aliases.push(AliasDecl { name, target });
                }
                SchemaEntry::Function { name, args, returns } => {
                    schema.functions.push(FunctionDecl {
                        name,
                        args,
                        returns: parse_return_shape(&returns)?,
                    });
                }
                SchemaEntry::Interface {
                    name,
                    constructor_args,
                    methods,
                } => {
                    let methods = methods
                        .into_iter()
                        .map(|m| -> Result<MethodSig, TransportError> {
                            Ok(MethodSig {
                                name: m.name,
                                args: m.args,
                                returns: parse_return_shape(&m.returns)?,
                            })
                        })
                        .collect::<Result<Vec<_>, _>>()?;
                    schema.interfaces.push(InterfaceDecl {
                        name,
                        constructor_args,
                        methods,
                    });
                }
            }
        }
        Ok(schema)
    }
}

/// Parse `"void"`, `"promise"`/`"promise<T>"`, `"observable"`/`"observable<T>"`.
/// The generic parameter, when present, names the value type to run through
/// the type registry on the way out; this crate does not need the name to
/// route the reply (the return shape alone decides the wire pattern).
fn parse_return_shape(raw: &str) -> Result<ReturnShape, TransportError> {
    let head = raw.split('<').next().unwrap_or(raw).trim();
    match head {
        "void" => Ok(ReturnShape::Void),
        "promise" => Ok(ReturnShape::Promise),
        "observable" => Ok(ReturnShape::Observable),
        other => Err(TransportError::UnknownMessageType(format!(
            "unrecognized return shape: {other}"
        ))),
    }
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;

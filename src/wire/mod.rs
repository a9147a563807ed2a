// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire codec: one JSON frame per socket message.
//!
//! A [`Frame`] carries the protocol/channel tags every RPC message must set,
//! plus a request/response/stream body tagged by `type`. Unknown optional
//! fields on any body are ignored by serde's default (non-`deny_unknown_fields`)
//! behavior, which is how forward compatibility is achieved.

use serde::{Deserialize, Serialize};

use crate::error::{RemoteError, TransportError};

pub const PROTOCOL: &str = "tether/1";
pub const CHANNEL_RPC: &str = "rpc";

/// A single parsed wire message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Frame {
    pub protocol: String,
    pub channel: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<u64>,
    #[serde(flatten)]
    pub body: FrameBody,
}

/// A request body is tagged by `type`; response and stream bodies carry no
/// tag at all and are distinguished structurally by the presence of
/// `hadError` (matching the wire's "responses are untyped" shape).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged, rename_all = "camelCase")]
pub enum FrameBody {
    Request(RequestBody),
    Stream {
        had_error: Option<bool>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<RemoteError>,
        #[serde(skip_serializing_if = "Option::is_none")]
        result: Option<StreamResult>,
    },
    Response {
        had_error: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        result: Option<serde_json::Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<RemoteError>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RequestBody {
    FunctionCall {
        function: String,
        args: Vec<serde_json::Value>,
    },
    MethodCall {
        object_id: u64,
        method: String,
        args: Vec<serde_json::Value>,
    },
    NewObject {
        interface: String,
        args: Vec<serde_json::Value>,
    },
    DisposeObject {
        object_id: u64,
    },
    DisposeObservable {},
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamResult {
    Next { data: serde_json::Value },
    Completed,
}

impl Frame {
    pub fn new(request_id: Option<u64>, body: FrameBody) -> Self {
        Self {
            protocol: PROTOCOL.to_string(),
            channel: CHANNEL_RPC.to_string(),
            request_id,
            body,
        }
    }

    /// Parse a single inbound text message into a `Frame`.
    ///
    /// Returns `MalformedFrame` for invalid JSON or a structurally invalid
    /// body, and `UnknownMessageType` for a recognized JSON object whose
    /// `type` tag isn't one of the known request/response/stream kinds.
    pub fn parse(text: &str) -> Result<Self, TransportError> {
        match serde_json::from_str::<Frame>(text) {
            Ok(frame) => Ok(frame),
            Err(err) => {
                if let Ok(raw) = serde_json::from_str::<serde_json::Value>(text) {
                    if let Some(ty) = raw.get("type").and_then(|v| v.as_str()) {
                        if !matches!(
                            ty,
                            "functionCall"
                                | "methodCall"
                                | "newObject"
                                | "disposeObject"
                                | "disposeObservable"
                                | "__response"
                                | "__stream"
                        ) {
                            return Err(TransportError::UnknownMessageType(ty.to_string()));
                        }
                    }
                }
                Err(TransportError::MalformedFrame(err))
            }
        }
    }

    pub fn encode(&self) -> Result<String, TransportError> {
        serde_json::to_string(self).map_err(TransportError::MalformedFrame)
    }

    /// `true` if the mandatory channel/protocol tags are set to the values
    /// this transport recognizes. Frames lacking either must be ignored with
    /// a warning rather than rejected with an error.
    pub fn is_recognized(&self) -> bool {
        self.protocol == PROTOCOL && self.channel == CHANNEL_RPC
    }

    pub fn response_ok(request_id: u64, result: serde_json::Value) -> Self {
        Self::new(
            Some(request_id),
            FrameBody::Response {
                had_error: false,
                result: Some(result),
                error: None,
            },
        )
    }

    pub fn response_err(request_id: u64, error: RemoteError) -> Self {
        Self::new(
            Some(request_id),
            FrameBody::Response {
                had_error: true,
                result: None,
                error: Some(error),
            },
        )
    }

    pub fn stream_next(request_id: u64, data: serde_json::Value) -> Self {
        Self::new(
            Some(request_id),
            FrameBody::Stream {
                had_error: None,
                error: None,
                result: Some(StreamResult::Next { data }),
            },
        )
    }

    pub fn stream_completed(request_id: u64) -> Self {
        Self::new(
            Some(request_id),
            FrameBody::Stream {
                had_error: None,
                error: None,
                result: Some(StreamResult::Completed),
            },
        )
    }

    pub fn stream_error(request_id: u64, error: RemoteError) -> Self {
        Self::new(
            Some(request_id),
            FrameBody::Stream {
                had_error: Some(true),
                error: Some(error),
                result: None,
            },
        )
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;

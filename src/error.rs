// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};

/// Unified error taxonomy shared by the wire codec, both dispatchers, and the
/// socket session layer.
///
/// Protocol violations (`MalformedFrame`, `UnknownMessageType`) are logged and
/// dropped without surfacing to any particular request. Dispatch-time errors
/// surface as a remote error to the request that caused them. `Timeout`,
/// `Backpressure`, and `Closed` originate on the calling side.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("malformed frame: {0}")]
    MalformedFrame(#[source] serde_json::Error),

    #[error("unknown message type: {0}")]
    UnknownMessageType(String),

    #[error("unknown service: {0}")]
    UnknownService(String),

    #[error("type already registered: {0}")]
    DuplicateTypeRegistration(String),

    #[error("unknown method: {interface}.{method}")]
    UnknownMethod { interface: String, method: String },

    #[error("object disposed: {0}")]
    ObjectDisposed(u64),

    #[error("handler error: {message}")]
    HandlerError {
        message: String,
        code: Option<String>,
        stack: Option<String>,
    },

    #[error("request {0} timed out")]
    Timeout(u64),

    #[error("outbound queue backpressure exceeded")]
    Backpressure,

    #[error("dispatcher closed")]
    Closed,

    #[error("socket transport error: {0}")]
    SocketClosed(String),
}

impl TransportError {
    /// HTTP status used only for the ancillary heartbeat endpoint's own
    /// failure modes; RPC errors never travel as HTTP statuses.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::MalformedFrame(_) | Self::UnknownMessageType(_) => 400,
            Self::UnknownService(_) | Self::UnknownMethod { .. } | Self::ObjectDisposed(_) => 404,
            Self::DuplicateTypeRegistration(_) => 409,
            Self::HandlerError { .. } => 500,
            Self::Timeout(_) => 504,
            Self::Backpressure => 429,
            Self::Closed | Self::SocketClosed(_) => 503,
        }
    }

    pub fn as_code(&self) -> &'static str {
        match self {
            Self::MalformedFrame(_) => "MALFORMED_FRAME",
            Self::UnknownMessageType(_) => "UNKNOWN_MESSAGE_TYPE",
            Self::UnknownService(_) => "UNKNOWN_SERVICE",
            Self::DuplicateTypeRegistration(_) => "DUPLICATE_TYPE_REGISTRATION",
            Self::UnknownMethod { .. } => "UNKNOWN_METHOD",
            Self::ObjectDisposed(_) => "OBJECT_DISPOSED",
            Self::HandlerError { .. } => "HANDLER_ERROR",
            Self::Timeout(_) => "TIMEOUT",
            Self::Backpressure => "BACKPRESSURE",
            Self::Closed => "CLOSED",
            Self::SocketClosed(_) => "SOCKET_CLOSED",
        }
    }

    /// Build the wire error body carried in a response/stream-error frame.
    pub fn to_remote_error(&self) -> RemoteError {
        match self {
            Self::HandlerError {
                message,
                code,
                stack,
            } => RemoteError {
                message: message.clone(),
                code: code.clone(),
                stack: stack.clone(),
            },
            other => RemoteError {
                message: other.to_string(),
                code: Some(other.as_code().to_string()),
                stack: None,
            },
        }
    }
}

/// Error body as it travels on the wire: `{message, code?, stack?}`.
///
/// `code` is only present when the thrown value on the originating side had
/// one; `stack` is advisory and never parsed by the receiving end.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemoteError {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for RemoteError {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;

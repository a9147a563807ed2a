// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::wire::Frame;

#[test]
fn malformed_frame_status_is_400() {
    let err = TransportError::MalformedFrame(serde_json::from_str::<Frame>("{").unwrap_err());
    assert_eq!(err.http_status(), 400);
    assert_eq!(err.as_code(), "MALFORMED_FRAME");
}

#[test]
fn handler_error_preserves_code_and_stack() {
    let err = TransportError::HandlerError {
        message: "boom".into(),
        code: Some("E_BOOM".into()),
        stack: Some("at foo".into()),
    };
    let remote = err.to_remote_error();
    assert_eq!(remote.message, "boom");
    assert_eq!(remote.code.as_deref(), Some("E_BOOM"));
    assert_eq!(remote.stack.as_deref(), Some("at foo"));
}

#[test]
fn other_variants_synthesize_a_code_with_no_stack() {
    let err = TransportError::Timeout(7);
    let remote = err.to_remote_error();
    assert_eq!(remote.code.as_deref(), Some("TIMEOUT"));
    assert!(remote.stack.is_none());
}

#[test]
fn remote_error_round_trips_through_json() {
    let remote = RemoteError {
        message: "nope".into(),
        code: None,
        stack: None,
    };
    let text = serde_json::to_string(&remote).unwrap();
    assert!(!text.contains("code"));
    assert!(!text.contains("stack"));
    let back: RemoteError = serde_json::from_str(&text).unwrap();
    assert_eq!(back, remote);
}

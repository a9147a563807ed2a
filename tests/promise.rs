// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Promise-shaped calls driven over a real TCP/WebSocket connection against
//! an in-process server.

mod support;

use serde_json::json;

use support::RECV_TIMEOUT;
use tether::wire::{Frame, FrameBody, RequestBody};

fn call(request_id: u64, function: &str, args: Vec<serde_json::Value>) -> Frame {
    Frame::new(
        Some(request_id),
        FrameBody::Request(RequestBody::FunctionCall {
            function: function.to_string(),
            args,
        }),
    )
}

#[tokio::test]
async fn successful_call_resolves_with_result() -> anyhow::Result<()> {
    let addr = support::spawn_server().await?;
    let (mut tx, mut rx) = support::connect(addr, "client-promise-ok").await?;

    support::send_frame(&mut tx, &call(1, "add", vec![json!(2), json!(3)])).await?;
    let reply = support::recv_frame(&mut rx, RECV_TIMEOUT).await?;

    assert_eq!(reply.request_id, Some(1));
    match reply.body {
        FrameBody::Response { had_error: false, result: Some(v), .. } => assert_eq!(v, json!(5.0)),
        other => panic!("unexpected reply: {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn handler_failure_surfaces_message_and_code() -> anyhow::Result<()> {
    let addr = support::spawn_server().await?;
    let (mut tx, mut rx) = support::connect(addr, "client-promise-err").await?;

    support::send_frame(&mut tx, &call(1, "boom", vec![])).await?;
    let reply = support::recv_frame(&mut rx, RECV_TIMEOUT).await?;

    match reply.body {
        FrameBody::Response { had_error: true, error: Some(err), .. } => {
            assert_eq!(err.message, "boom");
            assert_eq!(err.code.as_deref(), Some("EBOOM"));
        }
        other => panic!("unexpected reply: {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn void_call_produces_no_reply() -> anyhow::Result<()> {
    let addr = support::spawn_server().await?;
    let (mut tx, mut rx) = support::connect(addr, "client-void").await?;

    support::send_frame(&mut tx, &call(1, "log", vec![json!("hi")])).await?;
    assert!(
        support::no_frame_within(&mut rx, std::time::Duration::from_millis(200)).await,
        "a void call must never produce a reply frame"
    );
    Ok(())
}

#[tokio::test]
async fn unknown_function_surfaces_as_remote_error() -> anyhow::Result<()> {
    let addr = support::spawn_server().await?;
    let (mut tx, mut rx) = support::connect(addr, "client-unknown-fn").await?;

    support::send_frame(&mut tx, &call(1, "does-not-exist", vec![])).await?;
    let reply = support::recv_frame(&mut rx, RECV_TIMEOUT).await?;

    match reply.body {
        FrameBody::Response { had_error: true, error: Some(err), .. } => {
            assert_eq!(err.code.as_deref(), Some("UNKNOWN_SERVICE"));
        }
        other => panic!("unexpected reply: {other:?}"),
    }
    Ok(())
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reconnect contract: a client that drops its socket and redials with the
//! same identifier keeps its live objects, and frames queued while it had
//! no attached socket are delivered in order once it reattaches.

mod support;

use serde_json::json;

use support::RECV_TIMEOUT;
use tether::wire::{Frame, FrameBody, RequestBody, StreamResult};

#[tokio::test]
async fn live_objects_survive_a_reconnect_with_the_same_client_id() -> anyhow::Result<()> {
    let addr = support::spawn_server().await?;

    let (mut tx1, mut rx1) = support::connect(addr, "client-reconnect").await?;
    support::send_frame(
        &mut tx1,
        &Frame::new(
            Some(1),
            FrameBody::Request(RequestBody::NewObject {
                interface: "Session".into(),
                args: vec![],
            }),
        ),
    )
    .await?;
    let created = support::recv_frame(&mut rx1, RECV_TIMEOUT).await?;
    let FrameBody::Response { had_error: false, result: Some(object_id), .. } = created.body else {
        anyhow::bail!("expected successful NewObject reply");
    };
    let object_id = object_id.as_u64().unwrap();

    // Drop the first connection outright, simulating a network blip rather
    // than an explicit disconnect.
    drop(tx1);
    drop(rx1);

    // Give the server a moment to notice the read side closed.
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    let (mut tx2, mut rx2) = support::connect(addr, "client-reconnect").await?;
    support::send_frame(
        &mut tx2,
        &Frame::new(
            Some(2),
            FrameBody::Request(RequestBody::MethodCall {
                object_id,
                method: "greet".into(),
                args: vec![json!("again")],
            }),
        ),
    )
    .await?;
    let reply = support::recv_frame(&mut rx2, RECV_TIMEOUT).await?;
    match reply.body {
        FrameBody::Response { had_error: false, result: Some(v), .. } => {
            assert_eq!(v, json!("hello again"));
        }
        other => panic!("object from the prior connection should still be live: {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn frames_queued_while_detached_are_flushed_in_order_on_reattach() -> anyhow::Result<()> {
    let addr = support::spawn_server().await?;

    let (mut tx1, mut rx1) = support::connect(addr, "client-queue").await?;
    support::send_frame(
        &mut tx1,
        &Frame::new(
            Some(1),
            FrameBody::Request(RequestBody::NewObject {
                interface: "Session".into(),
                args: vec![],
            }),
        ),
    )
    .await?;
    let created = support::recv_frame(&mut rx1, RECV_TIMEOUT).await?;
    let FrameBody::Response { result: Some(object_id), .. } = created.body else {
        anyhow::bail!("expected NewObject reply");
    };
    let object_id = object_id.as_u64().unwrap();

    // Kick off the stream, then drop the socket immediately so the `next`
    // frames the handler produces have nowhere to go but the per-client
    // outbound queue.
    support::send_frame(
        &mut tx1,
        &Frame::new(
            Some(2),
            FrameBody::Request(RequestBody::MethodCall {
                object_id,
                method: "tail".into(),
                args: vec![],
            }),
        ),
    )
    .await?;
    drop(tx1);
    drop(rx1);

    // Let the handler finish producing all three values plus completion
    // while nobody is attached.
    tokio::time::sleep(std::time::Duration::from_millis(150)).await;

    let (_tx2, mut rx2) = support::connect(addr, "client-queue").await?;

    let mut values = Vec::new();
    loop {
        let frame = support::recv_frame(&mut rx2, RECV_TIMEOUT).await?;
        match frame.body {
            FrameBody::Stream { result: Some(StreamResult::Next { data }), .. } => values.push(data),
            FrameBody::Stream { result: Some(StreamResult::Completed), .. } => break,
            other => panic!("unexpected queued frame: {other:?}"),
        }
    }
    assert_eq!(values, vec![json!("a"), json!("b"), json!("c")]);
    Ok(())
}

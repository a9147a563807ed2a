// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use serde_json::json;

use super::*;
use crate::client::ClientDispatcher;
use crate::session::test_support::FakeSession;
use crate::wire::{Frame, FrameBody, RequestBody};

fn dispatcher() -> (
    Arc<ClientDispatcher>,
    tokio::sync::mpsc::UnboundedReceiver<Frame>,
) {
    let (session, rx) = FakeSession::new();
    (ClientDispatcher::new(session, Duration::from_millis(200)), rx)
}

#[tokio::test]
async fn method_call_queues_behind_unresolved_object_id() {
    let (dispatcher, mut rx) = dispatcher();
    let d = Arc::clone(&dispatcher);
    let proxy = d.create_object("Session", vec![]).await.unwrap();
    let new_object_sent = rx.recv().await.unwrap();
    let create_request_id = new_object_sent.request_id.unwrap();
    assert!(matches!(
        new_object_sent.body,
        FrameBody::Request(RequestBody::NewObject { .. })
    ));

    let d2 = Arc::clone(&dispatcher);
    let call = tokio::spawn(async move { proxy.call_method("greet", vec![json!("hi")]).await });

    // The method call must not reach the wire before the id resolves.
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(rx.try_recv().is_err());

    d2.handle_inbound(Frame::response_ok(create_request_id, json!(7)));

    let method_sent = rx.recv().await.unwrap();
    match method_sent.body {
        FrameBody::Request(RequestBody::MethodCall { object_id, method, .. }) => {
            assert_eq!(object_id, 7);
            assert_eq!(method, "greet");
        }
        other => panic!("unexpected body: {other:?}"),
    }
    d2.handle_inbound(Frame::response_ok(method_sent.request_id.unwrap(), json!("hello")));
    assert_eq!(call.await.unwrap().unwrap(), json!("hello"));
}

#[tokio::test]
async fn dispose_is_idempotent_and_blocks_further_calls() {
    let (dispatcher, mut rx) = dispatcher();
    let proxy = dispatcher.create_object("Session", vec![]).await.unwrap();
    let new_object_sent = rx.recv().await.unwrap();
    dispatcher.handle_inbound(Frame::response_ok(new_object_sent.request_id.unwrap(), json!(7)));

    let (dispose_result, _) = tokio::join!(proxy.dispose(), async {
        let dispose_sent = rx.recv().await.unwrap();
        dispatcher.handle_inbound(Frame::response_ok(
            dispose_sent.request_id.unwrap(),
            serde_json::Value::Null,
        ));
    });
    dispose_result.unwrap();

    // Second dispose on an already-disposed proxy is a no-op: it resolves
    // immediately without any further wire traffic.
    proxy.dispose().await.unwrap();
    assert!(rx.try_recv().is_err());

    // A method call after dispose fails locally with ObjectDisposed, never
    // reaching the wire.
    let err = proxy.call_method("greet", vec![]).await.unwrap_err();
    assert!(matches!(err, TransportError::ObjectDisposed(_)));
    assert!(rx.try_recv().is_err());
}

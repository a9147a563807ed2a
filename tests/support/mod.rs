// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared harness for the real-socket integration tests in this directory:
//! spins up the actual axum router over a loopback `TcpListener`, so every
//! scenario here drives the wire protocol over a genuine TCP connection
//! instead of the in-memory `FakeSession` the unit tests use.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio_tungstenite::tungstenite::Message as WsMessage;

use tether::registry::TypeRegistry;
use tether::schema::Schema;
use tether::server::{FunctionHandler, MethodHandler, ObjectHandle, ServiceTableBuilder, StreamItem};
use tether::{RemoteError, ServerDispatcher};

pub const RECV_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = r#"[
    {"kind":"function","name":"add","args":["number","number"],"returns":"promise<number>"},
    {"kind":"function","name":"boom","args":[],"returns":"promise<number>"},
    {"kind":"function","name":"log","args":["string"],"returns":"void"},
    {"kind":"interface","name":"Session","constructor_args":[],"methods":[
        {"name":"greet","args":["string"],"returns":"promise<string>"},
        {"name":"tail","args":["string"],"returns":"observable<string>"}
    ]}
]"#;

/// Boots a server exercising the same handler shapes as the unit tests
/// (`add`/`boom`/`log` functions, a `Session` interface with a promise
/// method and an observable method) bound to an ephemeral loopback port.
pub async fn spawn_server() -> anyhow::Result<SocketAddr> {
    let schema = Schema::parse(SCHEMA)?;
    let mut builder = ServiceTableBuilder::from_schema(&schema);

    builder.register_function(
        "add",
        FunctionHandler::Promise(Arc::new(|args| {
            Box::pin(async move {
                let a = args[0].as_f64().unwrap_or_default();
                let b = args[1].as_f64().unwrap_or_default();
                Ok(json!(a + b))
            })
        })),
    )?;
    builder.register_function(
        "boom",
        FunctionHandler::Promise(Arc::new(|_args| {
            Box::pin(async move {
                Err(RemoteError {
                    message: "boom".into(),
                    code: Some("EBOOM".into()),
                    stack: None,
                })
            })
        })),
    )?;
    builder.register_function(
        "log",
        FunctionHandler::Void(Arc::new(|_args| Box::pin(async move {}))),
    )?;
    builder.register_constructor(
        "Session",
        Arc::new(|_args| {
            Box::pin(async move {
                let handle: ObjectHandle = Arc::new(());
                Ok((handle, None))
            })
        }),
    )?;
    builder.register_method(
        "Session",
        "greet",
        MethodHandler::Promise(Arc::new(|_handle, args| {
            Box::pin(async move {
                let name = args.first().and_then(|v| v.as_str()).unwrap_or("world").to_string();
                Ok(json!(format!("hello {name}")))
            })
        })),
    )?;
    builder.register_method(
        "Session",
        "tail",
        MethodHandler::Observable(Arc::new(|_handle, _args| {
            Box::pin(async move {
                let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
                tokio::spawn(async move {
                    for item in ["a", "b", "c"] {
                        let _ = tx.send(StreamItem::Next(json!(item)));
                    }
                    let _ = tx.send(StreamItem::Completed);
                });
                rx
            })
        })),
    )?;

    let services = Arc::new(builder.build());
    let types = Arc::new(TypeRegistry::new());
    let dispatcher = ServerDispatcher::with_idle_timeout(services, types, Duration::from_secs(60));
    dispatcher.spawn_idle_sweep();

    let router = tether::transport::build_router(dispatcher);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    Ok(addr)
}

pub type WsStream = tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;
pub type WsTx = futures_util::stream::SplitSink<WsStream, WsMessage>;
pub type WsRx = futures_util::stream::SplitStream<WsStream>;

/// Dial the RPC upgrade endpoint and perform the client-identifier
/// handshake (spec: "the first frame on a newly accepted socket MUST be a
/// bare string carrying that identifier").
pub async fn connect(addr: SocketAddr, client_id: &str) -> anyhow::Result<(WsTx, WsRx)> {
    let url = format!("ws://{addr}/ws");
    let (stream, _response) = tokio_tungstenite::connect_async(&url).await?;
    let (mut tx, rx) = stream.split();
    tx.send(WsMessage::Text(client_id.to_string().into())).await?;
    Ok((tx, rx))
}

pub async fn send_frame(tx: &mut WsTx, frame: &tether::wire::Frame) -> anyhow::Result<()> {
    tx.send(WsMessage::Text(frame.encode()?.into())).await?;
    Ok(())
}

pub async fn recv_frame(rx: &mut WsRx, timeout: Duration) -> anyhow::Result<tether::wire::Frame> {
    let msg = tokio::time::timeout(timeout, rx.next())
        .await
        .map_err(|_| anyhow::anyhow!("timed out waiting for a frame"))?
        .ok_or_else(|| anyhow::anyhow!("socket closed before a frame arrived"))??;
    match msg {
        WsMessage::Text(text) => Ok(tether::wire::Frame::parse(&text)?),
        other => anyhow::bail!("expected a text frame, got {other:?}"),
    }
}

pub async fn no_frame_within(rx: &mut WsRx, timeout: Duration) -> bool {
    tokio::time::timeout(timeout, rx.next()).await.is_err()
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! tether: the bidirectional RPC transport core for a remote-development
//! backend — wire codec, socket session, type registry, client dispatcher,
//! and server dispatcher.
//!
//! Service business logic (filesystem access, version-control queries,
//! language-server wrappers, and the rest of the handler surface) is not
//! part of this crate: embedders call [`ServiceTableBuilder`] to attach
//! handlers to the names a loaded [`Schema`] already declares, then hand the
//! built [`server::ServiceTable`] to [`run_with`].

pub mod client;
pub mod config;
pub mod error;
pub mod proxy;
pub mod registry;
pub mod schema;
pub mod server;
pub mod session;
pub mod transport;
pub mod wire;

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

pub use config::Config;
pub use error::{RemoteError, TransportError};
pub use registry::TypeRegistry;
pub use schema::Schema;
pub use server::{ServerDispatcher, ServiceTable, ServiceTableBuilder};

/// Run the transport server with no service handlers registered. Useful for
/// smoke-testing the listener itself; a real deployment calls [`run_with`]
/// with a `register` closure that attaches handlers to the loaded schema.
pub async fn run(config: Config) -> anyhow::Result<()> {
    run_with(config, |_types, _builder| {}).await
}

/// Run the transport server, giving `register` a chance to populate the
/// [`TypeRegistry`] and attach handlers to the [`ServiceTableBuilder`]
/// derived from the loaded schema before the listener binds.
pub async fn run_with(
    config: Config,
    register: impl FnOnce(&TypeRegistry, &mut ServiceTableBuilder),
) -> anyhow::Result<()> {
    config.validate()?;

    let schema_text = tokio::fs::read_to_string(&config.schema).await?;
    let schema = Schema::parse(&schema_text)?;

    let types = Arc::new(TypeRegistry::new());
    let mut builder = ServiceTableBuilder::from_schema(&schema);
    register(&types, &mut builder);
    let services = Arc::new(builder.build());

    let dispatcher = ServerDispatcher::new(services, Arc::clone(&types));
    dispatcher.spawn_idle_sweep();
    if config.track_event_loop {
        spawn_event_loop_tracker();
    }

    let router = transport::build_router(Arc::clone(&dispatcher));
    let addr = format!("{}:{}", config.host, config.port);
    let shutdown = CancellationToken::new();
    tokio::spawn(wait_for_shutdown_signal(shutdown.clone()));

    match config.tls_paths() {
        Some((key, cert, ca)) => {
            let tls_config = transport::tls::load_mtls_config(key, cert, ca)?;
            tracing::info!(%addr, "tether listening (mTLS)");
            let handle = axum_server::Handle::new();
            tokio::spawn(shutdown_axum_server(shutdown.clone(), handle.clone()));
            axum_server::bind_rustls(addr.parse()?, tls_config)
                .handle(handle)
                .serve(router.into_make_service())
                .await?;
        }
        None => {
            tracing::info!(%addr, "tether listening");
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            axum::serve(listener, router).with_graceful_shutdown(shutdown.cancelled_owned()).await?;
        }
    }

    tracing::info!("tether shut down cleanly");
    Ok(())
}

/// Waits for SIGTERM or Ctrl-C and cancels `shutdown` to trigger a graceful
/// shutdown, exiting 0.
async fn wait_for_shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        if let Ok(mut sig) = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            sig.recv().await;
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    shutdown.cancel();
}

async fn shutdown_axum_server(shutdown: CancellationToken, handle: axum_server::Handle) {
    shutdown.cancelled().await;
    handle.graceful_shutdown(Some(Duration::from_secs(10)));
}

/// Diagnostics-only: logs a warning when the tokio runtime's scheduling
/// interval lags noticeably, surfaced via `config.track_event_loop`.
fn spawn_event_loop_tracker() {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_secs(1));
        let mut last = tokio::time::Instant::now();
        loop {
            tick.tick().await;
            let now = tokio::time::Instant::now();
            let lag = now.saturating_duration_since(last) - Duration::from_secs(1);
            if lag > Duration::from_millis(250) {
                tracing::warn!(lag_ms = lag.as_millis(), "event loop lag detected");
            }
            last = now;
        }
    });
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;

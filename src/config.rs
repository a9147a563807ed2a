// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process configuration: the listener's port, optional mTLS material, the
//! schema document to load at startup, and the ambient logging knobs.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// RPC transport server configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "tetherd", version, about)]
pub struct Config {
    /// Port to listen on for both the heartbeat HTTP endpoint and the RPC
    /// WebSocket upgrade.
    #[arg(long, default_value_t = 9090, env = "TETHER_PORT")]
    pub port: u16,

    /// Host address to bind to.
    #[arg(long, default_value = "0.0.0.0", env = "TETHER_HOST")]
    pub host: String,

    /// TLS private key path. Requires `cert` and `ca` to also be set.
    #[arg(long, env = "TETHER_KEY")]
    pub key: Option<PathBuf>,

    /// TLS certificate path. Requires `key` and `ca` to also be set.
    #[arg(long, env = "TETHER_CERT")]
    pub cert: Option<PathBuf>,

    /// Certificate authority path used to verify client certificates.
    /// Requires `key` and `cert` to also be set.
    #[arg(long, env = "TETHER_CA")]
    pub ca: Option<PathBuf>,

    /// Track the tokio runtime's event loop lag and log a warning when it
    /// exceeds a threshold (diagnostics only, never gates dispatch).
    #[arg(long, default_value_t = false, env = "TETHER_TRACK_EVENT_LOOP")]
    pub track_event_loop: bool,

    /// Per-call RPC timeout in milliseconds for `promise` calls.
    #[arg(long, default_value_t = 30_000, env = "TETHER_RPC_TIMEOUT_MS")]
    pub rpc_timeout_ms: u64,

    /// Path to the service schema document (JSON array of alias / interface
    /// / function entries) loaded at startup.
    #[arg(long, env = "TETHER_SCHEMA")]
    pub schema: PathBuf,

    /// Log output format.
    #[arg(long, default_value = "text", env = "TETHER_LOG_FORMAT")]
    pub log_format: LogFormat,

    /// Log level filter, passed through to `tracing_subscriber::EnvFilter`.
    #[arg(long, default_value = "info", env = "TETHER_LOG_LEVEL")]
    pub log_level: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

impl Config {
    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }

    /// Cross-checks TLS material: `key`/`cert`/`ca` must be either all
    /// present or all absent. TLS itself stays optional either way.
    pub fn validate(&self) -> anyhow::Result<()> {
        let present = [self.key.is_some(), self.cert.is_some(), self.ca.is_some()];
        if present.iter().any(|p| *p) && !present.iter().all(|p| *p) {
            anyhow::bail!("key, cert, and ca must be specified together or not at all");
        }
        Ok(())
    }

    pub fn tls_paths(&self) -> Option<(&PathBuf, &PathBuf, &PathBuf)> {
        match (&self.key, &self.cert, &self.ca) {
            (Some(key), Some(cert), Some(ca)) => Some((key, cert, ca)),
            _ => None,
        }
    }

    #[cfg(test)]
    pub fn test() -> Self {
        Self {
            port: 0,
            host: "127.0.0.1".into(),
            key: None,
            cert: None,
            ca: None,
            track_event_loop: false,
            rpc_timeout_ms: 200,
            schema: PathBuf::from("schema.json"),
            log_format: LogFormat::Text,
            log_level: "info".into(),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

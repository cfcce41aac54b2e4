//! Logger module
//!
//! Provides logging utilities for the gateway including:
//! - Server lifecycle logging
//! - Access logging with multiple formats
//! - Upstream, fallback and validation events
//!
//! Everything goes through `tracing`; [`init`] installs the subscriber.

mod format;

pub use format::AccessLogEntry;

use std::fs::OpenOptions;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

use crate::config::{Config, LoggingConfig};
use crate::error::{TransportError, ValidationError};
use crate::gateway::FetchOutcome;

/// Target used for access log lines, so they can be filtered separately
pub const ACCESS_TARGET: &str = "access";

/// Install the global subscriber
///
/// `RUST_LOG` wins over `logging.level`. With `logging.log_file` set, output
/// is appended to that file instead of stdout.
/// Should be called once at application startup.
pub fn init(config: &LoggingConfig) -> std::io::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str()));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let installed = match config.log_file.as_deref() {
        Some(path) => builder
            .with_ansi(false)
            .with_writer(Mutex::new(open_log_file(Path::new(path))?))
            .try_init(),
        None => builder.try_init(),
    };
    installed.map_err(|e| std::io::Error::other(e.to_string()))
}

fn open_log_file(path: &Path) -> std::io::Result<std::fs::File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    OpenOptions::new().create(true).append(true).open(path)
}

pub fn log_server_start(addr: &SocketAddr, config: &Config) {
    tracing::info!("======================================");
    tracing::info!("Gateway started successfully");
    tracing::info!("Listening on: http://{addr}");
    tracing::info!(
        "Upstream: {} (timeout {}s, single attempt)",
        config.upstream.base_url,
        config.upstream.timeout_secs
    );
    tracing::info!("Log level: {}", config.logging.level);
    if let Some(workers) = config.server.workers {
        tracing::info!("Worker threads: {workers}");
    }
    if let Some(ref path) = config.logging.log_file {
        tracing::info!("Log file: {path}");
    }
    match config.fallback.path {
        Some(ref path) => tracing::info!("Fallback catalog: {path}"),
        None => tracing::info!("Fallback catalog: bundled"),
    }
    tracing::info!("======================================");
}

pub fn log_connection_accepted(peer_addr: &SocketAddr) {
    tracing::debug!("[Connection] Accepted from: {peer_addr}");
}

pub fn log_connection_error(err: &impl std::fmt::Debug) {
    tracing::error!("[ERROR] Failed to serve connection: {err:?}");
}

pub fn log_error(message: &str) {
    tracing::error!("[ERROR] {message}");
}

pub fn log_warning(message: &str) {
    tracing::warn!("[WARN] {message}");
}

pub fn log_request_received(method: &str, path: &str) {
    tracing::debug!("[Request] {method} {path}");
}

/// Log formatted access log entry
pub fn log_access(entry: &AccessLogEntry, format: &str) {
    tracing::info!(target: ACCESS_TARGET, "{}", entry.format(format));
}

pub fn log_upstream_outcome(method: &str, path: &str, outcome: &FetchOutcome) {
    match outcome {
        FetchOutcome::Success(_) => tracing::debug!("[Upstream] {method} {path} -> ok"),
        FetchOutcome::UpstreamError(status) => {
            tracing::warn!("[Upstream] {method} {path} -> status {status}");
        }
        FetchOutcome::TransportError(cause) => {
            tracing::warn!("[Upstream] {method} {path} -> {cause}");
        }
    }
}

pub fn log_transform_failed(route: &str, cause: &TransportError) {
    tracing::warn!("[Transform] {route}: {cause}");
}

pub fn log_fallback_served(route: &str, key: Option<&str>) {
    match key {
        Some(key) => tracing::warn!("[Fallback] {route}/{key}: serving static data"),
        None => tracing::warn!("[Fallback] {route}: serving static data"),
    }
}

pub fn log_not_found(route: &str, key: &str) {
    tracing::info!("[NotFound] {route}/{key}: no upstream or fallback entry");
}

pub fn log_validation_failure(route: &str, err: &ValidationError) {
    tracing::info!(
        "[Validation] {route}: {err} ({})",
        err.subject().unwrap_or("-")
    );
}

pub fn log_submit_failed(route: &str, outcome: &FetchOutcome) {
    match outcome {
        FetchOutcome::UpstreamError(status) => {
            tracing::error!("[Submit] {route}: upstream answered {status}");
        }
        FetchOutcome::TransportError(cause) => tracing::error!("[Submit] {route}: {cause}"),
        FetchOutcome::Success(_) => {}
    }
}

pub fn log_shutdown_started(active: usize) {
    tracing::info!("[Shutdown] Signal received, no longer accepting ({active} active connections)");
}

pub fn log_shutdown_complete(remaining: usize) {
    if remaining == 0 {
        tracing::info!("[Shutdown] All connections drained, bye");
    } else {
        tracing::warn!("[Shutdown] Grace period over, dropping {remaining} connections");
    }
}

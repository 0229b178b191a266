//! File-only tracing setup shared by binaries.
//!
//! - **RUST_LOG**: filter, e.g. `info` or `thoughtgraph=debug`. Falls back to the
//!   caller's default.
//! - **LOG_FILE**: when set, events are appended there as plain text (no ANSI) via a
//!   non-blocking writer. When unset, events are dropped so stdout stays clean.
//!
//! Call after [`load_and_apply`](crate::load_and_apply) so both can come from `.env`.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::LoadError;

/// Keeps the background log writer alive; drop it at exit to flush.
#[must_use = "dropping the guard stops file logging"]
pub struct LogGuard {
    _worker: Option<WorkerGuard>,
    pub log_file: Option<String>,
}

pub fn init_logging(default_filter: &str) -> Result<LogGuard, LoadError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let Some(path) = std::env::var("LOG_FILE").ok().filter(|p| !p.trim().is_empty()) else {
        let sink = tracing_subscriber::fmt::layer()
            .with_writer(std::io::sink)
            .with_filter(filter);
        tracing_subscriber::registry()
            .with(sink)
            .try_init()
            .map_err(|e| LoadError::Logging(e.to_string()))?;
        return Ok(LogGuard {
            _worker: None,
            log_file: None,
        });
    };

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| LoadError::Logging(format!("open {path}: {e}")))?;
    let (writer, worker) = tracing_appender::non_blocking(file);
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_filter(filter);
    tracing_subscriber::registry()
        .with(layer)
        .try_init()
        .map_err(|e| LoadError::Logging(e.to_string()))?;
    tracing::info!(path = %path, "logging to file");
    Ok(LogGuard {
        _worker: Some(worker),
        log_file: Some(path),
    })
}

//! Logging infrastructure for mindmirror
//!
//! Logs are written to `~/.local/state/mindmirror/mindmirror.YYYY-MM-DD.log`
//! following XDG standards, one file per UTC day.

use crate::config::{Config, LoggingConfig};
use std::path::PathBuf;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Initialize the logging system
///
/// Sets up tracing with:
/// - File output to XDG state directory
/// - Daily rotation, keeping at most `max_files` files
/// - Configurable log level via config or RUST_LOG env var
pub fn init(config: &LoggingConfig) -> crate::error::Result<LoggingGuard> {
    let log_dir = Config::state_dir();

    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("mindmirror")
        .filename_suffix("log")
        .max_log_files(config.max_files.max(1))
        .build(&log_dir)
        .map_err(|e| crate::error::Error::Config(format!("failed to create log appender: {e}")))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .init();

    tracing::info!(
        log_file = %log_file_path().display(),
        level = %config.level,
        "Logging initialized"
    );

    Ok(LoggingGuard { _guard: guard })
}

/// Initialize logging for tests (logs to stdout)
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .with_span_events(FmtSpan::CLOSE)
        .try_init();
}

/// Guard that keeps the logging system alive
///
/// When dropped, flushes any pending log writes.
pub struct LoggingGuard {
    _guard: tracing_appender::non_blocking::WorkerGuard,
}

/// Returns the path of the file currently being written
pub fn log_file_path() -> PathBuf {
    Config::log_path()
}

//! Tracing bootstrap: console output filtered by `RUST_LOG` (falling back to
//! the configured level) plus an optional daily-rotated file sink.

use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::prelude::*;

use crate::core::config::LoggingConfig;
use crate::core::error::EngineError;
use crate::core::types::ErrorCategory;

static LOGGER_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Keeps the non-blocking file writer alive for the process lifetime.
pub struct LoggingGuard {
    _file_guard: Option<tracing_appender::non_blocking::WorkerGuard>,
}

/// Initialize the logging stack once per process.
pub fn init(config: &LoggingConfig) -> Result<LoggingGuard, EngineError> {
    if LOGGER_INITIALIZED
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        return Err(EngineError::new(
            ErrorCategory::ConfigurationError,
            "logging already initialized",
        ));
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.clone()));

    let (file_layer, file_guard) = match &config.log_dir {
        Some(dir) => {
            fs::create_dir_all(dir).map_err(|err| {
                EngineError::new(
                    ErrorCategory::IoError,
                    format!("failed to create log directory {}: {}", dir.display(), err),
                )
            })?;
            let appender = tracing_appender::rolling::daily(dir, "cadence.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .try_init()
        .map_err(|err| {
            EngineError::new(
                ErrorCategory::ConfigurationError,
                format!("failed to initialize logging: {}", err),
            )
        })?;

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

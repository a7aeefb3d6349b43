//! Logging setup for applications embedding the layer manager.
//!
//! The manager itself only emits `tracing` events. Applications that do not
//! already install a subscriber can call [`init_logging`] once at startup:
//!
//! ```ignore
//! use map_layer_manager::logging::{init_logging, LoggingConfig};
//!
//! let _guard = init_logging(&LoggingConfig::default().with_log_dir("/tmp/maps"))?;
//! ```
//!
//! `RUST_LOG` takes precedence over the configured default directive.

use std::path::PathBuf;

use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::EnvFilter;

/// Default filter directive when `RUST_LOG` is unset.
pub const DEFAULT_LOG_DIRECTIVE: &str = "map_layer_manager=info";

/// File name prefix for rolling log files.
pub const LOG_FILE_PREFIX: &str = "map-layer-manager.log";

/// Errors raised while installing the subscriber.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// A global subscriber is already installed.
    #[error("A global tracing subscriber is already installed")]
    AlreadyInitialized,

    /// The default directive could not be parsed.
    #[error("Invalid log directive '{directive}': {reason}")]
    InvalidDirective { directive: String, reason: String },
}

/// Logging configuration.
#[derive(Clone, Debug)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    pub directive: String,

    /// Directory for daily-rolling log files. `None` logs to stderr.
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directive: DEFAULT_LOG_DIRECTIVE.to_string(),
            log_dir: None,
        }
    }
}

impl LoggingConfig {
    /// Set the default filter directive.
    pub fn with_directive(mut self, directive: impl Into<String>) -> Self {
        self.directive = directive.into();
        self
    }

    /// Write logs to daily-rolling files in `dir` instead of stderr.
    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    fn env_filter(&self) -> Result<EnvFilter, LoggingError> {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return Ok(filter);
        }
        EnvFilter::try_new(&self.directive).map_err(|e| LoggingError::InvalidDirective {
            directive: self.directive.clone(),
            reason: e.to_string(),
        })
    }
}

/// Install the global `tracing` subscriber.
///
/// When logging to files, the returned guard must be kept alive for buffered
/// lines to be flushed.
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>, LoggingError> {
    let filter = config.env_filter()?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(LocalTime::rfc_3339())
        .with_target(true);

    match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            builder
                .with_ansi(false)
                .with_writer(writer)
                .try_init()
                .map_err(|_| LoggingError::AlreadyInitialized)?;
            Ok(Some(guard))
        }
        None => {
            builder
                .with_writer(std::io::stderr)
                .try_init()
                .map_err(|_| LoggingError::AlreadyInitialized)?;
            Ok(None)
        }
    }
}

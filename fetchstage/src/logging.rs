//! Logging setup.
//!
//! Installs a global `tracing` subscriber with an optional console layer on
//! stderr and an optional file layer. `RUST_LOG` overrides the configured
//! level when set.

use std::fs;
use std::io;
use std::path::PathBuf;

use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Default log file name inside the log directory.
pub const DEFAULT_LOG_FILE: &str = "fetchstage.log";

/// Timestamp format for log lines.
const TIME_FORMAT: &str = "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]";

/// Errors raised while installing the subscriber.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter '{filter}': {reason}")]
    InvalidFilter { filter: String, reason: String },

    #[error("failed to create log directory {}: {source}", path.display())]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("failed to install logger: {0}")]
    Init(String),
}

/// Where and how much to log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `fetchstage=debug`.
    pub level: String,
    /// Write logs to `directory/file_name` when set.
    pub directory: Option<PathBuf>,
    pub file_name: String,
    /// Also log to stderr.
    pub console: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
            file_name: DEFAULT_LOG_FILE.to_string(),
            console: true,
        }
    }
}

impl LoggingConfig {
    /// Full path of the log file, if file logging is enabled.
    pub fn file_path(&self) -> Option<PathBuf> {
        self.directory.as_ref().map(|dir| dir.join(&self.file_name))
    }
}

/// Keeps the non-blocking file writer alive.
///
/// Buffered lines are flushed when this is dropped, so hold it until exit.
#[must_use = "dropping the guard stops file logging"]
#[derive(Debug)]
pub struct LoggingGuard {
    _file: Option<WorkerGuard>,
}

/// Build the level filter, letting `RUST_LOG` take precedence.
pub fn build_filter(level: &str) -> Result<EnvFilter, LoggingError> {
    EnvFilter::try_from_default_env().or_else(|_| {
        EnvFilter::try_new(level).map_err(|e| LoggingError::InvalidFilter {
            filter: level.to_string(),
            reason: e.to_string(),
        })
    })
}

/// Install the global subscriber.
pub fn init_logging(config: &LoggingConfig) -> Result<LoggingGuard, LoggingError> {
    let filter = build_filter(&config.level)?;
    let format = time::format_description::parse(TIME_FORMAT)
        .map_err(|e| LoggingError::Init(e.to_string()))?;
    let timer = LocalTime::new(format);

    let console_layer = config.console.then(|| {
        fmt::layer()
            .with_writer(io::stderr)
            .with_timer(timer.clone())
            .with_target(false)
    });

    let (file_layer, file_guard) = match &config.directory {
        Some(dir) => {
            fs::create_dir_all(dir).map_err(|e| LoggingError::CreateDir {
                path: dir.clone(),
                source: e,
            })?;
            let appender = tracing_appender::rolling::never(dir, &config.file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_timer(timer)
                .with_thread_names(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| LoggingError::Init(e.to_string()))?;

    Ok(LoggingGuard { _file: file_guard })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, "info");
        assert!(config.console);
        assert!(config.file_path().is_none());
    }

    #[test]
    fn test_file_path() {
        let config = LoggingConfig {
            directory: Some(PathBuf::from("/var/log/fetchstage")),
            ..LoggingConfig::default()
        };
        assert_eq!(
            config.file_path(),
            Some(PathBuf::from("/var/log/fetchstage/fetchstage.log"))
        );
    }

    #[test]
    fn test_time_format_parses() {
        assert!(time::format_description::parse(TIME_FORMAT).is_ok());
    }
}

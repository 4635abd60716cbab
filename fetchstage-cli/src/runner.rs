//! Shared command setup: configuration loading and logging.

use std::path::Path;

use fetchstage::config::ConfigFile;
use fetchstage::logging::{init_logging, LoggingGuard};
use tracing::info;

use crate::error::CliError;

/// Loaded configuration plus the logging guard, held for a command's lifetime.
pub struct CliRunner {
    config: ConfigFile,
    _log_guard: LoggingGuard,
}

impl CliRunner {
    /// Load configuration (from `config_path` or the default location) and
    /// install logging.
    ///
    /// Console logging is only enabled with `verbose`, so log lines do not
    /// tear through progress bars; file logging follows the config.
    pub fn new(config_path: Option<&Path>, verbose: bool) -> Result<Self, CliError> {
        let config = load_config(config_path)?;

        let mut logging = config.logging_config();
        logging.console = verbose;
        let log_guard = init_logging(&logging)?;

        Ok(Self {
            config,
            _log_guard: log_guard,
        })
    }

    /// The loaded configuration.
    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// Log which command is running.
    pub fn log_startup(&self, command: &str) {
        info!(
            command,
            version = env!("CARGO_PKG_VERSION"),
            storage = %self.config.download.storage_dir.display(),
            "fetchstage starting"
        );
    }
}

/// Load configuration from an explicit path, or the default location.
pub fn load_config(config_path: Option<&Path>) -> Result<ConfigFile, CliError> {
    match config_path {
        Some(path) => Ok(ConfigFile::load_from(path)?),
        None => Ok(ConfigFile::load()?),
    }
}

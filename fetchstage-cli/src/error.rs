//! CLI error type.

use std::io;
use std::path::PathBuf;

use fetchstage::config::ConfigError;
use fetchstage::logging::LoggingError;
use fetchstage::manager::{ManagerError, Stage};
use thiserror::Error;

/// Errors surfaced to the user by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// Missing or inconsistent settings.
    #[error("{0}")]
    Config(String),

    #[error(transparent)]
    ConfigFile(#[from] ConfigError),

    #[error(transparent)]
    Logging(#[from] LoggingError),

    #[error(transparent)]
    Manager(#[from] ManagerError),

    /// The pipeline ended in a failed state.
    #[error("{stage} failed: {cause}")]
    Pipeline { stage: Stage, cause: String },

    #[error("failed to remove {}: {source}", path.display())]
    Clean { path: PathBuf, source: io::Error },
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::ConfigFile(_) => 2,
            Self::Pipeline {
                stage: Stage::Download,
                ..
            } => 3,
            Self::Pipeline {
                stage: Stage::Extract,
                ..
            } => 4,
            Self::Pipeline {
                stage: Stage::Install,
                ..
            } => 5,
            _ => 1,
        }
    }
}

//! Error types for the download/extract/install pipeline.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for manager operations.
pub type ManagerResult<T> = Result<T, ManagerError>;

/// Errors that can occur while fetching, extracting or handing off an artifact.
#[derive(Debug, Error)]
pub enum ManagerError {
    /// Failed to read a file or directory.
    #[error("failed to read {}: {source}", path.display())]
    ReadFailed { path: PathBuf, source: io::Error },

    /// Failed to write a file or directory.
    #[error("failed to write {}: {source}", path.display())]
    WriteFailed { path: PathBuf, source: io::Error },

    /// Failed to create a directory.
    #[error("failed to create directory {}: {source}", path.display())]
    CreateDirFailed { path: PathBuf, source: io::Error },

    /// Connection, DNS or mid-stream network failure.
    #[error("failed to download {url}: {reason}")]
    Network { url: String, reason: String },

    /// Network timeout.
    #[error("request to {url} timed out after {timeout_secs}s")]
    Timeout { url: String, timeout_secs: u64 },

    /// The server answered with a status the downloader cannot use.
    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { url: String, status: u16 },

    /// The server returned a range that does not start at the requested offset.
    #[error("server returned range starting at {actual}, expected {expected}")]
    RangeMismatch { expected: u64, actual: u64 },

    /// All bytes arrived but the partial file could not be moved into place.
    #[error("download complete, but failed to rename {} to {}: {source}", from.display(), to.display())]
    RenameFailed {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },

    /// An archive entry resolves outside the destination directory.
    #[error("archive entry '{entry}' escapes the destination directory")]
    PathTraversal { entry: String },

    /// The archive could not be parsed.
    #[error("invalid archive {}: {reason}", path.display())]
    InvalidArchive { path: PathBuf, reason: String },

    /// The installable payload is missing after extraction.
    #[error("installable payload not found at {}", .0.display())]
    ArtifactNotFound(PathBuf),

    /// No handler can process the installable payload.
    #[error("no installer available: {0}")]
    InstallerUnavailable(String),

    /// The installer was found but failed.
    #[error("installation of {} failed: {reason}", path.display())]
    InstallFailed { path: PathBuf, reason: String },

    /// A run is already in flight for this pipeline.
    #[error("a download or extraction is already in progress")]
    AlreadyRunning,

    /// The background worker thread could not be started.
    #[error("failed to spawn worker thread: {0}")]
    WorkerSpawnFailed(String),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ManagerError {
    /// Whether this failure happened on the network side of a transfer.
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            Self::Network { .. }
                | Self::Timeout { .. }
                | Self::UnexpectedStatus { .. }
                | Self::RangeMismatch { .. }
        )
    }
}

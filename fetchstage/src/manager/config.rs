//! Configuration for the artifact pipeline.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default timeout for HTTP requests in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300; // 5 minutes

/// Default read/write chunk size for transfers (8KB).
pub const DEFAULT_CHUNK_SIZE: usize = 8 * 1024;

/// Suffix appended to the artifact path while a transfer is in flight.
pub const PARTIAL_SUFFIX: &str = ".part";

/// On-disk locations for one artifact.
///
/// ```text
/// <storage_dir>/<base_name>.zip          final artifact
/// <storage_dir>/<base_name>.zip.part     in-progress partial
/// <storage_dir>/<base_name>/             extraction destination
/// <storage_dir>/<base_name>/<base_name>.apk   installable payload
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLayout {
    /// Directory holding the artifact and its extraction directory.
    pub storage_dir: PathBuf,
    /// Base name shared by the archive, directory and payload.
    pub base_name: String,
    /// Extension of the downloaded archive.
    pub archive_extension: String,
    /// Extension of the installable payload inside the archive.
    pub payload_extension: String,
}

impl ArtifactLayout {
    /// Create a layout with the default `zip`/`apk` extensions.
    pub fn new(storage_dir: impl Into<PathBuf>, base_name: impl Into<String>) -> Self {
        Self {
            storage_dir: storage_dir.into(),
            base_name: base_name.into(),
            archive_extension: "zip".to_string(),
            payload_extension: "apk".to_string(),
        }
    }

    /// Set the payload extension.
    pub fn with_payload_extension(mut self, ext: impl Into<String>) -> Self {
        self.payload_extension = ext.into();
        self
    }

    /// Final path of the downloaded archive.
    pub fn archive_path(&self) -> PathBuf {
        self.storage_dir
            .join(format!("{}.{}", self.base_name, self.archive_extension))
    }

    /// Path of the in-progress partial download.
    pub fn partial_path(&self) -> PathBuf {
        partial_path_for(&self.archive_path())
    }

    /// Directory the archive is extracted into.
    pub fn extract_dir(&self) -> PathBuf {
        self.storage_dir.join(&self.base_name)
    }

    /// Expected location of the installable payload after extraction.
    pub fn payload_path(&self) -> PathBuf {
        self.extract_dir()
            .join(format!("{}.{}", self.base_name, self.payload_extension))
    }
}

/// Derive the partial path for a target by appending [`PARTIAL_SUFFIX`].
pub fn partial_path_for(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_owned();
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}

/// Configuration for the pipeline.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Where the artifact lives on disk.
    pub layout: ArtifactLayout,

    /// HTTP request timeout.
    pub timeout: Duration,

    /// Size of each read from the response body.
    pub chunk_size: usize,

    /// Program (and leading arguments) used to hand off the payload.
    ///
    /// `None` means no installer is configured.
    pub install_command: Option<Vec<String>>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            layout: ArtifactLayout::new(
                std::env::temp_dir().join("fetchstage"),
                "artifact",
            ),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            chunk_size: DEFAULT_CHUNK_SIZE,
            install_command: None,
        }
    }
}

impl ManagerConfig {
    /// Create a new configuration for the given layout.
    pub fn new(layout: ArtifactLayout) -> Self {
        Self {
            layout,
            ..Default::default()
        }
    }

    /// Set the HTTP timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the transfer chunk size (minimum 1 byte).
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Set the installer command.
    pub fn with_install_command(mut self, command: Vec<String>) -> Self {
        self.install_command = if command.is_empty() {
            None
        } else {
            Some(command)
        };
        self
    }
}

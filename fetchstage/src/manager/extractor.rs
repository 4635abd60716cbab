//! Streaming archive extraction.
//!
//! This module handles:
//! - Reading a zip archive one entry at a time, in stored order
//! - Rejecting entries that would land outside the destination
//! - Writing directories and files through a fixed buffer
//!
//! Only the central directory index is held in memory. Entry data is copied
//! in chunks, so multi-gigabyte artifacts extract with a fixed buffer. The
//! index supplies sizes for entries whose local header defers them to a
//! trailing data descriptor.

use std::fs::{self, File};
use std::io::{self, BufReader, Read, Write};
use std::path::{Component, Path, PathBuf};

use tracing::{debug, info, warn};
use zip::ZipArchive;

use super::error::{ManagerError, ManagerResult};
use super::traits::ArchiveExtractor;

/// Buffer size for reading the archive and writing entries (64KB).
const BUFFER_SIZE: usize = 64 * 1024;

/// One entry of a flat archive.
#[derive(Debug)]
pub struct ArchiveEntry<R> {
    /// Relative path inside the archive.
    pub name: String,
    /// Whether this entry is a directory marker.
    pub is_directory: bool,
    /// Entry bytes.
    pub content: R,
}

/// Counts reported by a successful extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionSummary {
    /// Directory the archive was extracted into.
    pub destination_dir: PathBuf,
    /// Number of file entries written.
    pub files_written: usize,
    /// Number of directory entries created.
    pub directories_created: usize,
    /// Total bytes written across all files.
    pub bytes_written: u64,
}

impl ExtractionSummary {
    fn new(destination_dir: &Path) -> Self {
        Self {
            destination_dir: destination_dir.to_path_buf(),
            files_written: 0,
            directories_created: 0,
            bytes_written: 0,
        }
    }
}

/// Terminal outcome of an extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionStatus {
    /// Every entry was written and the archive removed.
    Success,
    /// Extraction aborted; files written so far stay on disk.
    Failure(String),
}

/// Destination plus outcome, as delivered to the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionResult {
    /// Directory the archive was (partially) extracted into.
    pub destination_dir: PathBuf,
    /// Outcome.
    pub status: ExtractionStatus,
}

impl ExtractionResult {
    /// Build a result from the return value of [`ArchiveExtractor::extract`].
    pub fn from_outcome(destination_dir: &Path, outcome: &ManagerResult<ExtractionSummary>) -> Self {
        let status = match outcome {
            Ok(_) => ExtractionStatus::Success,
            Err(e) => ExtractionStatus::Failure(e.to_string()),
        };
        Self {
            destination_dir: destination_dir.to_path_buf(),
            status,
        }
    }

    /// Whether extraction succeeded.
    pub fn is_success(&self) -> bool {
        self.status == ExtractionStatus::Success
    }
}

/// Resolve an entry name to a path strictly inside `dest_dir`.
///
/// `..` is allowed only while it stays below the destination; absolute paths,
/// drive prefixes and names that collapse to the destination itself are
/// rejected.
pub fn resolve_entry_path(dest_dir: &Path, name: &str) -> ManagerResult<PathBuf> {
    let traversal = || ManagerError::PathTraversal {
        entry: name.to_string(),
    };

    let normalized = name.replace('\\', "/");
    let mut relative = PathBuf::new();
    let mut depth = 0usize;

    for component in Path::new(&normalized).components() {
        match component {
            Component::Normal(part) => {
                relative.push(part);
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if depth == 0 {
                    return Err(traversal());
                }
                relative.pop();
                depth -= 1;
            }
            Component::RootDir | Component::Prefix(_) => return Err(traversal()),
        }
    }

    if depth == 0 {
        return Err(traversal());
    }

    Ok(dest_dir.join(relative))
}

/// Zip extractor that copies entries one at a time in stored order.
#[derive(Debug, Default)]
pub struct ZipStreamExtractor;

impl ZipStreamExtractor {
    /// Create a new streaming zip extractor.
    pub fn new() -> Self {
        Self
    }

    fn extract_entries(&self, archive: &Path, dest_dir: &Path) -> ManagerResult<ExtractionSummary> {
        fs::create_dir_all(dest_dir).map_err(|e| ManagerError::CreateDirFailed {
            path: dest_dir.to_path_buf(),
            source: e,
        })?;

        let file = File::open(archive).map_err(|e| ManagerError::ReadFailed {
            path: archive.to_path_buf(),
            source: e,
        })?;
        let invalid = |e: zip::result::ZipError| ManagerError::InvalidArchive {
            path: archive.to_path_buf(),
            reason: e.to_string(),
        };

        let mut zip = ZipArchive::new(BufReader::with_capacity(BUFFER_SIZE, file)).map_err(invalid)?;
        let mut summary = ExtractionSummary::new(dest_dir);
        debug!(entries = zip.len(), "Read archive index");

        for index in 0..zip.len() {
            let mut zip_entry = zip.by_index(index).map_err(invalid)?;
            let entry = ArchiveEntry {
                name: zip_entry.name().to_string(),
                is_directory: zip_entry.is_dir(),
                content: &mut zip_entry,
            };
            write_entry(archive, dest_dir, entry, &mut summary)?;
        }

        Ok(summary)
    }
}

impl ArchiveExtractor for ZipStreamExtractor {
    fn extract(&self, archive_path: &Path, dest_dir: &Path) -> ManagerResult<ExtractionSummary> {
        info!(
            archive = %archive_path.display(),
            dest = %dest_dir.display(),
            "Extracting archive"
        );

        let summary = match self.extract_entries(archive_path, dest_dir) {
            Ok(summary) => summary,
            Err(e) => {
                warn!(archive = %archive_path.display(), error = %e, "Extraction aborted");
                return Err(e);
            }
        };

        if let Err(e) = fs::remove_file(archive_path) {
            warn!(
                archive = %archive_path.display(),
                error = %e,
                "Extracted, but could not remove archive"
            );
        }

        info!(
            files = summary.files_written,
            directories = summary.directories_created,
            bytes = summary.bytes_written,
            "Extraction complete"
        );
        Ok(summary)
    }
}

/// Write a single entry under `dest_dir`.
fn write_entry<R: Read>(
    archive: &Path,
    dest_dir: &Path,
    mut entry: ArchiveEntry<R>,
    summary: &mut ExtractionSummary,
) -> ManagerResult<()> {
    let out_path = resolve_entry_path(dest_dir, &entry.name)?;

    if entry.is_directory {
        debug!(entry = %entry.name, "Creating directory");
        fs::create_dir_all(&out_path).map_err(|e| ManagerError::CreateDirFailed {
            path: out_path.clone(),
            source: e,
        })?;
        summary.directories_created += 1;
        return Ok(());
    }

    if let Some(parent) = out_path.parent() {
        fs::create_dir_all(parent).map_err(|e| ManagerError::CreateDirFailed {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    let out_file = File::create(&out_path).map_err(|e| ManagerError::WriteFailed {
        path: out_path.clone(),
        source: e,
    })?;
    let mut writer = io::BufWriter::with_capacity(BUFFER_SIZE, out_file);
    let mut buffer = vec![0u8; BUFFER_SIZE];
    let mut written = 0u64;

    loop {
        let bytes_read = entry
            .content
            .read(&mut buffer)
            .map_err(|e| ManagerError::ReadFailed {
                path: archive.to_path_buf(),
                source: e,
            })?;

        if bytes_read == 0 {
            break;
        }

        writer
            .write_all(&buffer[..bytes_read])
            .map_err(|e| ManagerError::WriteFailed {
                path: out_path.clone(),
                source: e,
            })?;
        written += bytes_read as u64;
    }

    writer.flush().map_err(|e| ManagerError::WriteFailed {
        path: out_path.clone(),
        source: e,
    })?;

    debug!(entry = %entry.name, bytes = written, "Wrote file");
    summary.files_written += 1;
    summary.bytes_written += written;
    Ok(())
}

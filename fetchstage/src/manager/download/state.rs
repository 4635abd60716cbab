//! Transfer state for a single resumable download.
//!
//! The partial file on disk is the durable part of this record: its length is
//! the resume offset, so a fresh `TransferState` built after a crash picks up
//! exactly where the previous process stopped.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::progress::{Progress, ProgressEvent};
use crate::manager::config::partial_path_for;
use crate::manager::error::{ManagerError, ManagerResult};

/// Lifecycle of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    /// No bytes requested yet in this process.
    NotStarted,
    /// Bytes are being streamed into the partial file.
    InProgress,
    /// The partial file has been renamed to the target path.
    Completed,
    /// The last attempt failed; the partial file is kept for resume.
    Failed,
}

/// Progress record for one download.
#[derive(Debug, Clone)]
pub struct TransferState {
    /// Final artifact path.
    pub target_path: PathBuf,
    /// In-progress partial path (`target_path` + `.part`).
    pub partial_path: PathBuf,
    /// Bytes currently held in the partial file.
    pub bytes_downloaded: u64,
    /// Total artifact size, once a response header has revealed it.
    pub total_bytes: Option<u64>,
    /// Current lifecycle status.
    pub status: TransferStatus,
}

impl TransferState {
    /// Create a state for `target_path`, reading any partial file already on disk.
    pub fn new(target_path: impl Into<PathBuf>) -> ManagerResult<Self> {
        let target_path = target_path.into();
        let partial_path = partial_path_for(&target_path);
        let mut state = Self {
            target_path,
            partial_path,
            bytes_downloaded: 0,
            total_bytes: None,
            status: TransferStatus::NotStarted,
        };
        state.refresh()?;
        Ok(state)
    }

    /// Re-read the partial file length into `bytes_downloaded`.
    ///
    /// Returns the resume offset.
    pub fn refresh(&mut self) -> ManagerResult<u64> {
        self.bytes_downloaded = partial_len(&self.partial_path)?;
        Ok(self.bytes_downloaded)
    }

    /// Offset the next request must start from.
    pub fn resume_offset(&self) -> u64 {
        self.bytes_downloaded
    }

    /// Whether a partial file with at least one byte is waiting to be resumed.
    pub fn has_partial(&self) -> bool {
        self.bytes_downloaded > 0
    }

    /// Mark the transfer as started with the given total size.
    pub fn begin(&mut self, total_bytes: Option<u64>) {
        self.total_bytes = total_bytes;
        self.status = TransferStatus::InProgress;
    }

    /// Reset to an empty partial, used when the server restarts from byte 0.
    pub fn restart(&mut self) {
        self.bytes_downloaded = 0;
    }

    /// Account for a chunk that has been written to the partial file.
    pub fn record_chunk(&mut self, bytes: u64) -> ProgressEvent {
        self.bytes_downloaded += bytes;
        self.progress_event()
    }

    /// Current progress snapshot.
    pub fn progress_event(&self) -> ProgressEvent {
        ProgressEvent {
            bytes_downloaded: self.bytes_downloaded,
            total_bytes: self.total_bytes,
            progress: Progress::from_bytes(self.bytes_downloaded, self.total_bytes),
        }
    }

    /// Record that the partial has been renamed to the target path.
    pub fn mark_completed(&mut self) {
        self.status = TransferStatus::Completed;
    }

    /// Record a failed attempt.
    pub fn mark_failed(&mut self) {
        self.status = TransferStatus::Failed;
    }

    /// Whether the artifact is complete and in place at `target_path`.
    pub fn is_complete(&self) -> bool {
        self.status == TransferStatus::Completed
    }

    /// Remove the partial file and reset the byte count.
    pub fn discard_partial(&mut self) -> ManagerResult<()> {
        match fs::remove_file(&self.partial_path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(ManagerError::WriteFailed {
                    path: self.partial_path.clone(),
                    source: e,
                })
            }
        }
        self.bytes_downloaded = 0;
        self.status = TransferStatus::NotStarted;
        Ok(())
    }
}

/// Length of the partial file, or 0 when absent.
fn partial_len(path: &Path) -> ManagerResult<u64> {
    match fs::metadata(path) {
        Ok(meta) => Ok(meta.len()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
        Err(e) => Err(ManagerError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_new_without_partial() {
        let temp = TempDir::new().unwrap();
        let state = TransferState::new(temp.path().join("a.zip")).unwrap();

        assert_eq!(state.partial_path, temp.path().join("a.zip.part"));
        assert_eq!(state.bytes_downloaded, 0);
        assert_eq!(state.total_bytes, None);
        assert_eq!(state.status, TransferStatus::NotStarted);
        assert!(!state.has_partial());
    }

    #[test]
    fn test_new_reads_partial_length() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.zip.part"), vec![0u8; 1234]).unwrap();

        let state = TransferState::new(temp.path().join("a.zip")).unwrap();
        assert_eq!(state.resume_offset(), 1234);
        assert!(state.has_partial());
    }

    #[test]
    fn test_record_chunk_reports_progress() {
        let temp = TempDir::new().unwrap();
        let mut state = TransferState::new(temp.path().join("a.zip")).unwrap();
        state.begin(Some(1000));

        let event = state.record_chunk(250);
        assert_eq!(event.bytes_downloaded, 250);
        assert_eq!(event.progress, Progress::Percent(25));
        assert_eq!(state.status, TransferStatus::InProgress);
    }

    #[test]
    fn test_unknown_total_is_indeterminate() {
        let temp = TempDir::new().unwrap();
        let mut state = TransferState::new(temp.path().join("a.zip")).unwrap();
        state.begin(None);

        assert_eq!(state.record_chunk(10).progress, Progress::Indeterminate);
    }

    #[test]
    fn test_discard_partial() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.zip.part"), b"abc").unwrap();
        let mut state = TransferState::new(temp.path().join("a.zip")).unwrap();

        state.discard_partial().unwrap();
        assert!(!state.partial_path.exists());
        assert_eq!(state.bytes_downloaded, 0);

        // Discarding twice is fine
        state.discard_partial().unwrap();
    }

    #[test]
    fn test_status_transitions() {
        let temp = TempDir::new().unwrap();
        let mut state = TransferState::new(temp.path().join("a.zip")).unwrap();

        state.mark_failed();
        assert_eq!(state.status, TransferStatus::Failed);
        assert!(!state.is_complete());

        state.mark_completed();
        assert!(state.is_complete());
    }
}

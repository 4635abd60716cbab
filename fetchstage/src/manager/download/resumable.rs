//! Resumable single-file downloader.
//!
//! Bytes already in the partial file are never requested again. The partial
//! is only renamed to the target once the body has been fully written, so the
//! target path never holds a half-written artifact.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::http::RangeResponse;
use super::progress::ProgressEvent;
use super::state::TransferState;
use crate::manager::config::DEFAULT_CHUNK_SIZE;
use crate::manager::error::{ManagerError, ManagerResult};
use crate::manager::traits::RangeFetcher;

/// How a response lines up with the bytes already on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumePlan {
    /// Append the body at `offset`.
    Append { offset: u64, total: Option<u64> },
    /// The server ignored the range; truncate and write from byte 0.
    Restart { total: Option<u64> },
    /// The partial already holds the whole entity.
    AlreadyComplete { total: u64 },
}

impl ResumePlan {
    /// Decide how to apply `response` to a partial of `offset` bytes.
    pub fn for_response(url: &str, offset: u64, response: &RangeResponse) -> ManagerResult<Self> {
        let declared_total = response.content_range.and_then(|r| r.total);

        match response.status {
            206 => {
                if let Some(start) = response.content_range.and_then(|r| r.start) {
                    if start != offset {
                        return Err(ManagerError::RangeMismatch {
                            expected: offset,
                            actual: start,
                        });
                    }
                }
                let total = declared_total.or_else(|| response.content_length.map(|len| offset + len));
                Ok(Self::Append { offset, total })
            }
            200 if offset == 0 => Ok(Self::Append {
                offset: 0,
                total: response.content_length,
            }),
            200 => Ok(Self::Restart {
                total: response.content_length,
            }),
            // An empty entity answers `bytes=0-` with `416 bytes */0`
            416 if declared_total == Some(offset) => Ok(Self::AlreadyComplete { total: offset }),
            status => Err(ManagerError::UnexpectedStatus {
                url: url.to_string(),
                status,
            }),
        }
    }
}

/// Downloads one artifact into its partial file and finalizes it.
#[derive(Debug)]
pub struct ResumableDownloader<F> {
    fetcher: F,
    chunk_size: usize,
}

impl<F: RangeFetcher> ResumableDownloader<F> {
    /// Create a downloader with the default 8KB chunk size.
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Set the chunk size (minimum 1 byte).
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Get the configured chunk size.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Download `url` into `state`, resuming from the partial file if present.
    ///
    /// `on_progress` is invoked after every chunk with a strictly increasing
    /// byte count. On success the partial has been renamed to
    /// `state.target_path` and that path is returned. On failure the partial
    /// file keeps every byte that was written.
    pub fn download<P>(
        &self,
        url: &str,
        state: &mut TransferState,
        mut on_progress: P,
    ) -> ManagerResult<PathBuf>
    where
        P: FnMut(ProgressEvent),
    {
        let result = self.run(url, state, &mut on_progress);
        match &result {
            Ok(path) => {
                state.mark_completed();
                info!(
                    url,
                    path = %path.display(),
                    bytes = state.bytes_downloaded,
                    "Download complete"
                );
            }
            Err(e) => {
                state.mark_failed();
                warn!(
                    url,
                    bytes = state.bytes_downloaded,
                    error = %e,
                    "Download failed, partial file kept for resume"
                );
            }
        }
        result
    }

    fn run<P>(&self, url: &str, state: &mut TransferState, on_progress: &mut P) -> ManagerResult<PathBuf>
    where
        P: FnMut(ProgressEvent),
    {
        let offset = state.refresh()?;
        info!(url, offset, "Starting transfer");

        let response = self.fetcher.fetch_from(url, offset)?;
        let plan = ResumePlan::for_response(url, offset, &response)?;
        debug!(?plan, "Resume plan");

        let (start, total) = match plan {
            ResumePlan::Append { offset, total } => (offset, total),
            ResumePlan::Restart { total } => {
                warn!(url, offset, "Server ignored range request, restarting from byte 0");
                state.restart();
                (0, total)
            }
            ResumePlan::AlreadyComplete { total } => {
                drop(response);
                drop(open_partial(&state.partial_path, total, plan)?);
                state.begin(Some(total));
                on_progress(state.progress_event());
                return finalize(state);
            }
        };

        state.begin(total);
        let mut file = open_partial(&state.partial_path, start, plan)?;
        self.stream_body(url, response.body, &mut file, state, on_progress)?;

        file.sync_all().map_err(|e| ManagerError::WriteFailed {
            path: state.partial_path.clone(),
            source: e,
        })?;
        drop(file);

        if let Some(total) = state.total_bytes {
            if state.bytes_downloaded < total {
                return Err(ManagerError::Network {
                    url: url.to_string(),
                    reason: format!(
                        "connection closed after {} of {} bytes",
                        state.bytes_downloaded, total
                    ),
                });
            }
        }

        finalize(state)
    }

    /// Copy the body into the partial file chunk by chunk.
    fn stream_body<P>(
        &self,
        url: &str,
        mut body: Box<dyn Read + Send>,
        file: &mut File,
        state: &mut TransferState,
        on_progress: &mut P,
    ) -> ManagerResult<()>
    where
        P: FnMut(ProgressEvent),
    {
        let mut buffer = vec![0u8; self.chunk_size];

        loop {
            let bytes_read = body.read(&mut buffer).map_err(|e| ManagerError::Network {
                url: url.to_string(),
                reason: format!("Read error: {}", e),
            })?;

            if bytes_read == 0 {
                return Ok(());
            }

            file.write_all(&buffer[..bytes_read])
                .map_err(|e| ManagerError::WriteFailed {
                    path: state.partial_path.clone(),
                    source: e,
                })?;

            on_progress(state.record_chunk(bytes_read as u64));
        }
    }
}

/// Open the partial file for writing at `start`, truncating on restart.
fn open_partial(path: &Path, start: u64, plan: ResumePlan) -> ManagerResult<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| ManagerError::CreateDirFailed {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    let write_err = |e| ManagerError::WriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(write_err)?;

    if matches!(plan, ResumePlan::Restart { .. }) {
        file.set_len(0).map_err(write_err)?;
    }

    file.seek(SeekFrom::Start(start)).map_err(write_err)?;
    Ok(file)
}

/// Atomically move the partial file to the target path.
fn finalize(state: &mut TransferState) -> ManagerResult<PathBuf> {
    fs::rename(&state.partial_path, &state.target_path).map_err(|e| {
        ManagerError::RenameFailed {
            from: state.partial_path.clone(),
            to: state.target_path.clone(),
            source: e,
        }
    })?;
    Ok(state.target_path.clone())
}

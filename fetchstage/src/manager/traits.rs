//! Seams between the pipeline and its collaborators.
//!
//! The pipeline only talks to the network, the archive format and the
//! platform installer through these traits, so each can be swapped for an
//! in-memory double in tests.

use std::path::Path;
use std::sync::Arc;

use super::download::RangeResponse;
use super::error::ManagerResult;
use super::extractor::ExtractionSummary;

/// Issues a ranged GET and exposes the streaming response.
pub trait RangeFetcher: Send + Sync {
    /// Request `url` starting at byte `offset` (`Range: bytes=<offset>-`).
    ///
    /// Implementations return the response as soon as headers are known; the
    /// body is read incrementally by the caller.
    fn fetch_from(&self, url: &str, offset: u64) -> ManagerResult<RangeResponse>;
}

impl<T: RangeFetcher + ?Sized> RangeFetcher for Arc<T> {
    fn fetch_from(&self, url: &str, offset: u64) -> ManagerResult<RangeResponse> {
        (**self).fetch_from(url, offset)
    }
}

/// Streams an archive into a destination directory.
pub trait ArchiveExtractor: Send + Sync {
    /// Extract every entry of `archive_path` under `dest_dir`.
    ///
    /// The archive is deleted once all entries are written.
    fn extract(&self, archive_path: &Path, dest_dir: &Path) -> ManagerResult<ExtractionSummary>;
}

impl<T: ArchiveExtractor + ?Sized> ArchiveExtractor for Arc<T> {
    fn extract(&self, archive_path: &Path, dest_dir: &Path) -> ManagerResult<ExtractionSummary> {
        (**self).extract(archive_path, dest_dir)
    }
}

/// The platform sink that consumes an extracted, installable payload.
pub trait Installer: Send + Sync {
    /// Whether a handler exists that can install `payload`.
    fn is_available(&self, payload: &Path) -> bool;

    /// Dispatch the install action for `payload`.
    fn install(&self, payload: &Path) -> ManagerResult<()>;
}

impl<T: Installer + ?Sized> Installer for Arc<T> {
    fn is_available(&self, payload: &Path) -> bool {
        (**self).is_available(payload)
    }

    fn install(&self, payload: &Path) -> ManagerResult<()> {
        (**self).install(payload)
    }
}

//! Resumable HTTP download of a single artifact.
//!
//! This module provides:
//! - Ranged GET requests over HTTP (`http`)
//! - Durable transfer state backed by the partial file (`state`)
//! - Percentage / indeterminate progress events (`progress`)
//! - The resume-and-finalize loop (`resumable`)
//!
//! # Architecture
//!
//! ```text
//! ResumableDownloader
//!         │
//!         ├── RangeFetcher (trait)
//!         │       └── HttpRangeFetcher
//!         │
//!         ├── TransferState (partial file length = resume offset)
//!         │
//!         └── ProgressEvent (per chunk)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use fetchstage::manager::download::{HttpRangeFetcher, ResumableDownloader, TransferState};
//!
//! let downloader = ResumableDownloader::new(HttpRangeFetcher::new()?);
//! let mut state = TransferState::new("/data/app.zip")?;
//!
//! downloader.download("https://example.com/app.zip", &mut state, |event| {
//!     println!("{} bytes ({:?})", event.bytes_downloaded, event.progress);
//! })?;
//! ```

mod http;
mod progress;
mod resumable;
mod state;

pub use http::{ContentRange, HttpRangeFetcher, RangeResponse};
pub use progress::{Progress, ProgressEvent};
pub use resumable::{ResumableDownloader, ResumePlan};
pub use state::{TransferState, TransferStatus};

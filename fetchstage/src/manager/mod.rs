//! Artifact manager: resumable download, staged extraction and install hand-off.
//!
//! # Components
//!
//! - [`download`] - ranged HTTP transfer into a `.part` file with atomic finalize
//! - [`extractor`] - streaming zip extraction with path containment
//! - [`installer`] - hand-off of the extracted payload to an external installer
//! - [`pipeline`] - the controller that sequences the three on a worker thread
//!
//! # Example
//!
//! ```ignore
//! use fetchstage::manager::{ArtifactLayout, ManagerConfig, Pipeline, PipelineEvent};
//!
//! let config = ManagerConfig::new(ArtifactLayout::new("/data", "app"));
//! let mut pipeline = Pipeline::from_config(&config)?;
//!
//! pipeline.start("https://example.com/app.zip")?;
//! let outcome = pipeline.run_to_completion(|event| {
//!     if let PipelineEvent::Progress(p) = event {
//!         println!("{:?}", p.progress);
//!     }
//! });
//! println!("{}", outcome);
//! ```

pub mod config;
pub mod download;
pub mod error;
pub mod extractor;
pub mod installer;
pub mod pipeline;
pub mod traits;

#[cfg(test)]
mod testing;

pub use config::{ArtifactLayout, ManagerConfig, DEFAULT_CHUNK_SIZE, DEFAULT_TIMEOUT_SECS};
pub use download::{
    HttpRangeFetcher, Progress, ProgressEvent, ResumableDownloader, TransferState, TransferStatus,
};
pub use error::{ManagerError, ManagerResult};
pub use extractor::{ExtractionResult, ExtractionStatus, ExtractionSummary, ZipStreamExtractor};
pub use installer::{CommandInstaller, NoInstaller};
pub use pipeline::{Pipeline, PipelineEvent, PipelineState, Stage};
pub use traits::{ArchiveExtractor, Installer, RangeFetcher};

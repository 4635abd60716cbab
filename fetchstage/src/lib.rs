//! fetchstage - resumable artifact download and staged extraction
//!
//! This library fetches one large packaged artifact over HTTP, resumes
//! interrupted transfers from the bytes already on disk, streams the archive
//! into an install-ready directory and hands the payload to an installer.
//!
//! - [`manager`] - downloader, extractor, installer hand-off and pipeline
//! - [`config`] - INI configuration file
//! - [`logging`] - `tracing` subscriber setup

pub mod config;
pub mod logging;
pub mod manager;

pub use manager::{ManagerError, ManagerResult, Pipeline, PipelineEvent, PipelineState};

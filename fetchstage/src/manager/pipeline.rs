//! Pipeline controller: Download → Extract → Install hand-off.
//!
//! The controller lives on the caller's thread and owns the state machine.
//! Each run spawns exactly one worker thread that performs the blocking
//! download, extraction and installer hand-off and reports back over a
//! channel:
//!
//! ```text
//!   control thread                         worker thread
//!   ──────────────                         ─────────────
//!   start(url) ──spawn──────────────────▶  ResumableDownloader::download
//!                                              │ Progress(event)*
//!   next_event() ◀──── WorkerMessage ──────────┤ Downloaded(path)
//!                                              │
//!                                          ArchiveExtractor::extract
//!   next_event() ◀──── WorkerMessage ──────────┤ Extracted(result)
//!                                              │
//!                                          Installer hand-off
//!   next_event() ◀──── WorkerMessage ──────────┘ HandedOff | HandOffFailed
//! ```
//!
//! The controller is the only producer of [`PipelineEvent`]s, so state
//! changes and progress arrive in one ordered stream and the terminal state
//! change is always the last event of a run.

use std::collections::VecDeque;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info, warn};

use super::config::{ArtifactLayout, ManagerConfig, DEFAULT_CHUNK_SIZE};
use super::download::{HttpRangeFetcher, ProgressEvent, ResumableDownloader, TransferState};
use super::error::{ManagerError, ManagerResult};
use super::extractor::{ExtractionResult, ExtractionStatus, ZipStreamExtractor};
use super::installer::{hand_off, CommandInstaller, NoInstaller};
use super::traits::{ArchiveExtractor, Installer, RangeFetcher};

/// Name given to the per-run worker thread.
const WORKER_THREAD_NAME: &str = "fetchstage-worker";

/// Pipeline stage a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Download,
    Extract,
    Install,
}

impl Stage {
    /// Lowercase stage name used in logs and messages.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Download => "download",
            Self::Extract => "extract",
            Self::Install => "install",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// User-visible state of the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineState {
    /// Nothing has been started.
    Idle,
    /// The artifact is being transferred.
    Downloading,
    /// The artifact is being unpacked.
    Extracting,
    /// Extraction succeeded and the payload was handed to the installer.
    ReadyToInstall {
        destination_dir: PathBuf,
        payload: PathBuf,
    },
    /// The run stopped at `stage`.
    Failed { stage: Stage, cause: String },
}

impl PipelineState {
    /// Whether this state ends a run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::ReadyToInstall { .. } | Self::Failed { .. })
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Downloading => write!(f, "downloading"),
            Self::Extracting => write!(f, "extracting"),
            Self::ReadyToInstall { payload, .. } => {
                write!(f, "ready to install {}", payload.display())
            }
            Self::Failed { stage, cause } => write!(f, "{} failed: {}", stage, cause),
        }
    }
}

/// Event delivered to the caller, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    /// The pipeline entered a new state.
    StateChanged(PipelineState),
    /// Bytes were written to the partial file.
    Progress(ProgressEvent),
}

/// Message from the worker thread to the controller.
#[derive(Debug)]
enum WorkerMessage {
    Progress(ProgressEvent),
    Downloaded(PathBuf),
    DownloadFailed(String),
    Extracted(ExtractionResult),
    HandedOff {
        destination_dir: PathBuf,
        payload: PathBuf,
    },
    HandOffFailed(String),
}

/// Everything one worker run needs, moved onto the worker thread.
struct WorkerJob {
    url: String,
    layout: ArtifactLayout,
    fetcher: Arc<dyn RangeFetcher>,
    extractor: Arc<dyn ArchiveExtractor>,
    installer: Arc<dyn Installer>,
    chunk_size: usize,
    auto_install: bool,
}

impl WorkerJob {
    fn run(self, tx: UnboundedSender<WorkerMessage>) {
        let archive = match self.download(&tx) {
            Ok(path) => path,
            Err(e) => {
                let _ = tx.send(WorkerMessage::DownloadFailed(e.to_string()));
                return;
            }
        };

        if tx.send(WorkerMessage::Downloaded(archive.clone())).is_err() {
            debug!("Controller dropped, skipping extraction");
            return;
        }

        let dest = self.layout.extract_dir();
        let outcome = self.extractor.extract(&archive, &dest);
        if let Ok(summary) = &outcome {
            info!(
                dest = %dest.display(),
                files = summary.files_written,
                directories = summary.directories_created,
                bytes = summary.bytes_written,
                "Extraction complete"
            );
        }
        let result = ExtractionResult::from_outcome(&dest, &outcome);
        let extracted = result.is_success();
        if tx.send(WorkerMessage::Extracted(result)).is_err() || !extracted {
            return;
        }

        let message = match self.hand_off_payload() {
            Ok(payload) => WorkerMessage::HandedOff {
                destination_dir: dest,
                payload,
            },
            Err(e) => WorkerMessage::HandOffFailed(e.to_string()),
        };
        let _ = tx.send(message);
    }

    fn hand_off_payload(&self) -> ManagerResult<PathBuf> {
        let payload = self.layout.payload_path();
        if self.auto_install {
            hand_off(self.installer.as_ref(), &payload)?;
        } else if !payload.is_file() {
            return Err(ManagerError::ArtifactNotFound(payload));
        }
        Ok(payload)
    }

    fn download(&self, tx: &UnboundedSender<WorkerMessage>) -> ManagerResult<PathBuf> {
        let archive = self.layout.archive_path();
        let mut state = TransferState::new(&archive)?;

        // A finished archive only exists after the atomic rename, so it is whole.
        if archive.is_file() && !state.has_partial() {
            state.discard_partial()?;
            info!(path = %archive.display(), "Archive already downloaded, skipping transfer");
            return Ok(archive);
        }

        let downloader =
            ResumableDownloader::new(Arc::clone(&self.fetcher)).with_chunk_size(self.chunk_size);
        downloader.download(&self.url, &mut state, |event| {
            let _ = tx.send(WorkerMessage::Progress(event));
        })
    }
}

/// A run in flight.
struct ActiveRun {
    receiver: UnboundedReceiver<WorkerMessage>,
    handle: JoinHandle<()>,
    /// Stage the worker is currently in.
    stage: Stage,
}

/// Sequences download, extraction and installer hand-off for one artifact.
pub struct Pipeline {
    layout: ArtifactLayout,
    fetcher: Arc<dyn RangeFetcher>,
    extractor: Arc<dyn ArchiveExtractor>,
    installer: Arc<dyn Installer>,
    chunk_size: usize,
    auto_install: bool,
    state: PipelineState,
    pending: VecDeque<PipelineEvent>,
    active: Option<ActiveRun>,
}

impl Pipeline {
    /// Create a pipeline from explicit collaborators.
    pub fn new<F, E, I>(layout: ArtifactLayout, fetcher: F, extractor: E, installer: I) -> Self
    where
        F: RangeFetcher + 'static,
        E: ArchiveExtractor + 'static,
        I: Installer + 'static,
    {
        Self {
            layout,
            fetcher: Arc::new(fetcher),
            extractor: Arc::new(extractor),
            installer: Arc::new(installer),
            chunk_size: DEFAULT_CHUNK_SIZE,
            auto_install: true,
            state: PipelineState::Idle,
            pending: VecDeque::new(),
            active: None,
        }
    }

    /// Create a pipeline using HTTP, streaming zip extraction and the
    /// configured install command (or none).
    pub fn from_config(config: &ManagerConfig) -> ManagerResult<Self> {
        let fetcher = HttpRangeFetcher::with_timeout(config.timeout)?;
        let installer: Arc<dyn Installer> = match config
            .install_command
            .as_deref()
            .and_then(CommandInstaller::from_command)
        {
            Some(installer) => Arc::new(installer),
            None => Arc::new(NoInstaller),
        };

        let mut pipeline = Self::new(
            config.layout.clone(),
            fetcher,
            ZipStreamExtractor::new(),
            installer,
        );
        pipeline.chunk_size = config.chunk_size;
        Ok(pipeline)
    }

    /// Set the transfer chunk size (minimum 1 byte).
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Whether to dispatch the installer after extraction.
    ///
    /// When disabled the run still ends in `ReadyToInstall` once the payload
    /// is confirmed present, but the installer is never invoked.
    pub fn with_auto_install(mut self, auto_install: bool) -> Self {
        self.auto_install = auto_install;
        self
    }

    /// Begin a run for `url`.
    ///
    /// Allowed from `Idle` and from any terminal state; an existing partial
    /// file is resumed.
    pub fn start(&mut self, url: &str) -> ManagerResult<()> {
        if self.is_running() {
            return Err(ManagerError::AlreadyRunning);
        }

        let (tx, receiver) = mpsc::unbounded_channel();
        let job = WorkerJob {
            url: url.to_string(),
            layout: self.layout.clone(),
            fetcher: Arc::clone(&self.fetcher),
            extractor: Arc::clone(&self.extractor),
            installer: Arc::clone(&self.installer),
            chunk_size: self.chunk_size,
            auto_install: self.auto_install,
        };

        let handle = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || job.run(tx))
            .map_err(|e| ManagerError::WorkerSpawnFailed(e.to_string()))?;

        info!(url, storage = %self.layout.storage_dir.display(), "Pipeline started");
        self.active = Some(ActiveRun {
            receiver,
            handle,
            stage: Stage::Download,
        });
        self.transition(PipelineState::Downloading);
        Ok(())
    }

    /// Wait for the next event.
    ///
    /// Returns `None` once the run has ended and every event was delivered,
    /// or immediately when nothing is running.
    ///
    /// # Panics
    ///
    /// Must not be called from inside an async runtime; use
    /// [`try_next_event`](Self::try_next_event) there.
    pub fn next_event(&mut self) -> Option<PipelineEvent> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(event);
            }
            let message = self.active.as_mut()?.receiver.blocking_recv();
            match message {
                Some(message) => self.apply(message),
                None => self.worker_disconnected(),
            }
        }
    }

    /// Return the next event if one is ready, without blocking.
    pub fn try_next_event(&mut self) -> Option<PipelineEvent> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(event);
            }
            let message = self.active.as_mut()?.receiver.try_recv();
            match message {
                Ok(message) => self.apply(message),
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Disconnected) => self.worker_disconnected(),
            }
        }
    }

    /// Drain events until the run ends and return the terminal state.
    pub fn run_to_completion<C>(&mut self, mut on_event: C) -> PipelineState
    where
        C: FnMut(&PipelineEvent),
    {
        while let Some(event) = self.next_event() {
            on_event(&event);
        }
        self.state.clone()
    }

    /// Current state.
    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    /// Whether a run is in flight.
    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    /// Whether a resumable partial download exists on disk.
    pub fn has_partial(&self) -> bool {
        self.layout.partial_path().is_file()
    }

    /// Bytes held in the partial download, or 0.
    pub fn partial_bytes(&self) -> u64 {
        TransferState::new(self.layout.archive_path())
            .map(|state| state.resume_offset())
            .unwrap_or(0)
    }

    /// On-disk layout this pipeline manages.
    pub fn layout(&self) -> &ArtifactLayout {
        &self.layout
    }

    fn apply(&mut self, message: WorkerMessage) {
        match message {
            WorkerMessage::Progress(event) => {
                self.pending.push_back(PipelineEvent::Progress(event));
            }
            WorkerMessage::Downloaded(path) => {
                debug!(path = %path.display(), "Artifact finalized");
                self.enter_stage(Stage::Extract);
                self.transition(PipelineState::Extracting);
            }
            WorkerMessage::DownloadFailed(cause) => {
                self.finish_run();
                self.transition(PipelineState::Failed {
                    stage: Stage::Download,
                    cause,
                });
            }
            WorkerMessage::Extracted(result) => match result.status {
                ExtractionStatus::Success => {
                    debug!(dest = %result.destination_dir.display(), "Handing off payload");
                    self.enter_stage(Stage::Install);
                }
                ExtractionStatus::Failure(cause) => {
                    self.finish_run();
                    self.transition(PipelineState::Failed {
                        stage: Stage::Extract,
                        cause,
                    });
                }
            },
            WorkerMessage::HandedOff {
                destination_dir,
                payload,
            } => {
                self.finish_run();
                self.transition(PipelineState::ReadyToInstall {
                    destination_dir,
                    payload,
                });
            }
            WorkerMessage::HandOffFailed(cause) => {
                self.finish_run();
                self.transition(PipelineState::Failed {
                    stage: Stage::Install,
                    cause,
                });
            }
        }
    }

    fn enter_stage(&mut self, stage: Stage) {
        if let Some(run) = self.active.as_mut() {
            run.stage = stage;
        }
    }

    /// The worker hung up without a terminal message.
    fn worker_disconnected(&mut self) {
        let stage = self
            .active
            .as_ref()
            .map_or(Stage::Download, |run| run.stage);
        self.finish_run();
        if !self.state.is_terminal() {
            error!(%stage, "Worker exited without reporting a result");
            self.transition(PipelineState::Failed {
                stage,
                cause: "worker exited unexpectedly".to_string(),
            });
        }
    }

    fn finish_run(&mut self) {
        if let Some(run) = self.active.take() {
            if run.handle.join().is_err() {
                warn!("Worker thread panicked");
            }
        }
    }

    fn transition(&mut self, next: PipelineState) {
        match &next {
            PipelineState::Failed { stage, cause } => {
                warn!(%stage, cause = %cause, "Pipeline failed")
            }
            other => info!(state = %other, "Pipeline state changed"),
        }
        self.state = next.clone();
        self.pending.push_back(PipelineEvent::StateChanged(next));
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("layout", &self.layout)
            .field("chunk_size", &self.chunk_size)
            .field("auto_install", &self.auto_install)
            .field("state", &self.state)
            .field("running", &self.is_running())
            .finish()
    }
}

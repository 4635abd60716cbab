//! Fetch command - download, extract and hand off the artifact.

use std::time::Duration;

use clap::Args;
use console::style;
use fetchstage::config::{format_size, ConfigFile};
use fetchstage::manager::{Pipeline, PipelineEvent, PipelineState, ProgressEvent, Stage};
use indicatif::{HumanBytes, ProgressBar, ProgressStyle};

use super::common::{resolve_manager_config, LayoutArgs};
use crate::error::CliError;

/// Arguments for the fetch command.
#[derive(Debug, Args)]
pub struct FetchArgs {
    /// Artifact URL (overrides `url` in the [download] section)
    #[arg(long)]
    pub url: Option<String>,

    #[command(flatten)]
    pub layout: LayoutArgs,

    /// Stop after extraction instead of running the installer
    #[arg(long)]
    pub no_install: bool,
}

/// Run the fetch command.
pub fn run(args: FetchArgs, config: &ConfigFile) -> Result<(), CliError> {
    let url = args
        .url
        .clone()
        .or_else(|| config.download.url.clone())
        .ok_or_else(|| {
            CliError::Config(
                "No URL specified. Use --url or set url in config.ini [download] section."
                    .to_string(),
            )
        })?;

    let manager_config = resolve_manager_config(config, &args.layout);
    let mut pipeline = Pipeline::from_config(&manager_config)?.with_auto_install(!args.no_install);

    if pipeline.has_partial() {
        println!(
            "Resuming download, {} already on disk",
            format_size(pipeline.partial_bytes())
        );
    }

    pipeline.start(&url)?;

    let mut display = FetchDisplay::default();
    let outcome = pipeline.run_to_completion(|event| display.handle(event));
    display.clear();

    match outcome {
        PipelineState::ReadyToInstall {
            destination_dir,
            payload,
        } => {
            println!(
                "{} Extracted to {}",
                style("✔").green(),
                destination_dir.display()
            );
            if args.no_install {
                println!("  Payload ready: {}", payload.display());
            } else {
                println!("  Installer started for {}", payload.display());
            }
            Ok(())
        }
        PipelineState::Failed { stage, cause } => {
            if stage == Stage::Download && pipeline.has_partial() {
                println!(
                    "{} {} kept on disk; run fetch again to resume",
                    style("!").yellow(),
                    format_size(pipeline.partial_bytes())
                );
            }
            Err(CliError::Pipeline { stage, cause })
        }
        other => Err(CliError::Pipeline {
            stage: Stage::Download,
            cause: format!("run ended while {}", other),
        }),
    }
}

/// Renders pipeline events as a progress bar or spinner.
#[derive(Default)]
struct FetchDisplay {
    bar: Option<ProgressBar>,
}

impl FetchDisplay {
    fn handle(&mut self, event: &PipelineEvent) {
        match event {
            PipelineEvent::Progress(progress) => self.on_progress(progress),
            PipelineEvent::StateChanged(PipelineState::Extracting) => {
                if let Some(bar) = self.bar.take() {
                    bar.finish_with_message("downloaded");
                }
                let spinner = ProgressBar::new_spinner().with_style(spinner_style());
                spinner.set_message("Extracting...");
                spinner.enable_steady_tick(Duration::from_millis(100));
                self.bar = Some(spinner);
            }
            PipelineEvent::StateChanged(state) if state.is_terminal() => self.clear(),
            PipelineEvent::StateChanged(_) => {}
        }
    }

    fn on_progress(&mut self, event: &ProgressEvent) {
        let bar = self.bar.get_or_insert_with(|| match event.total_bytes {
            Some(total) => ProgressBar::new(total).with_style(bytes_style()),
            None => {
                let spinner = ProgressBar::new_spinner().with_style(spinner_style());
                spinner.enable_steady_tick(Duration::from_millis(100));
                spinner
            }
        });

        bar.set_position(event.bytes_downloaded);
        if event.total_bytes.is_none() {
            bar.set_message(format!(
                "Downloading... {}",
                HumanBytes(event.bytes_downloaded)
            ));
        }
    }

    fn clear(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}

fn bytes_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "  [{elapsed_precise}] [{bar:30.cyan/blue}] {bytes}/{total_bytes} ({percent}%) {bytes_per_sec}",
    )
    .map(|s| s.progress_chars("━━╾─"))
    .unwrap_or_else(|_| ProgressStyle::default_bar())
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("  {spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

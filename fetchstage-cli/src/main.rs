//! fetchstage CLI - Command-line interface
//!
//! Downloads a packaged artifact with resume support, extracts it and hands
//! the payload to the configured installer.

mod commands;
mod error;
mod runner;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use console::style;

use commands::common::LayoutArgs;
use commands::config::ConfigCommands;
use commands::fetch::FetchArgs;
use error::CliError;
use runner::CliRunner;

#[derive(Debug, Parser)]
#[command(name = "fetchstage", version, about, long_about = None)]
struct Cli {
    /// Use this configuration file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log to stderr as well as the configured log file
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Download (or resume), extract and install the artifact
    Fetch(FetchArgs),

    /// Show partial, archive and extraction state
    Status(LayoutArgs),

    /// Remove the partial download, archive and extracted files
    Clean(LayoutArgs),

    /// Inspect or create the configuration file
    #[command(subcommand)]
    Config(ConfigCommands),
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("{} {}", style("Error:").red().bold(), e);
        process::exit(e.exit_code());
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config_path = cli.config.as_deref();

    match cli.command {
        // Config commands must work even when the file is missing or invalid.
        Commands::Config(command) => commands::config::run(command, config_path),
        Commands::Fetch(args) => {
            let runner = CliRunner::new(config_path, cli.verbose)?;
            runner.log_startup("fetch");
            commands::fetch::run(args, runner.config())
        }
        Commands::Status(layout) => {
            let runner = CliRunner::new(config_path, cli.verbose)?;
            commands::status::run(&layout, runner.config())
        }
        Commands::Clean(layout) => {
            let runner = CliRunner::new(config_path, cli.verbose)?;
            runner.log_startup("clean");
            commands::clean::run(&layout, runner.config())
        }
    }
}

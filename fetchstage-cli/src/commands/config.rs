//! Configuration CLI commands.

use std::path::{Path, PathBuf};

use clap::Subcommand;
use fetchstage::config::{config_file_path, ConfigFile};

use crate::error::CliError;
use crate::runner::load_config;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Show the configuration file path
    Path,

    /// Show the effective configuration
    Show,

    /// Write a configuration file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Run a config subcommand.
///
/// `config_path` is the `--config` override, if any.
pub fn run(command: ConfigCommands, config_path: Option<&Path>) -> Result<(), CliError> {
    match command {
        ConfigCommands::Path => {
            println!("{}", target_path(config_path).display());
            Ok(())
        }
        ConfigCommands::Show => {
            print_config(&load_config(config_path)?);
            Ok(())
        }
        ConfigCommands::Init { force } => run_init(&target_path(config_path), force),
    }
}

fn target_path(config_path: Option<&Path>) -> PathBuf {
    config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(config_file_path)
}

fn run_init(path: &Path, force: bool) -> Result<(), CliError> {
    if path.exists() && !force {
        return Err(CliError::Config(format!(
            "{} already exists. Use --force to overwrite it.",
            path.display()
        )));
    }

    ConfigFile::default().save_to(path)?;
    println!("Configuration file: {}", path.display());
    println!("CLI arguments override config file values when specified.");
    Ok(())
}

fn print_config(config: &ConfigFile) {
    let not_set = || "(not set)".to_string();
    let d = &config.download;

    println!("[download]");
    println!("  url = {}", d.url.clone().unwrap_or_else(not_set));
    println!("  storage_dir = {}", d.storage_dir.display());
    println!("  base_name = {}", d.base_name);
    println!("  timeout_secs = {}", d.timeout_secs);
    println!("  chunk_size = {}", d.chunk_size);
    println!();
    println!("[install]");
    println!("  payload_extension = {}", config.install.payload_extension);
    println!(
        "  command = {}",
        config
            .install
            .command
            .as_ref()
            .map(|c| c.join(" "))
            .unwrap_or_else(not_set)
    );
    println!();
    println!("[logging]");
    println!("  level = {}", config.logging.level);
    println!(
        "  directory = {}",
        config
            .logging
            .directory
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(not_set)
    );
}

//! Helpers shared across commands.

use std::path::PathBuf;

use fetchstage::config::ConfigFile;
use fetchstage::manager::ManagerConfig;

/// Layout overrides accepted by several commands.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct LayoutArgs {
    /// Directory holding the archive and extraction directory
    #[arg(long)]
    pub storage_dir: Option<PathBuf>,

    /// Base name of the archive, extraction directory and payload
    #[arg(long)]
    pub base_name: Option<String>,
}

/// Build the manager configuration, CLI overrides taking precedence.
pub fn resolve_manager_config(config: &ConfigFile, layout: &LayoutArgs) -> ManagerConfig {
    let mut config = config.clone();
    if let Some(dir) = &layout.storage_dir {
        config.download.storage_dir = dir.clone();
    }
    if let Some(name) = &layout.base_name {
        config.download.base_name = name.clone();
    }
    config.to_manager_config()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_config() {
        let mut config = ConfigFile::default();
        config.download.storage_dir = PathBuf::from("/from/config");
        config.download.base_name = "configured".to_string();

        let layout = LayoutArgs {
            storage_dir: Some(PathBuf::from("/from/cli")),
            base_name: None,
        };
        let manager = resolve_manager_config(&config, &layout);

        assert_eq!(manager.layout.storage_dir, PathBuf::from("/from/cli"));
        assert_eq!(manager.layout.base_name, "configured");
    }
}

//! User configuration file.
//!
//! Settings live in an INI file at `~/.config/fetchstage/config.ini` (or the
//! platform equivalent):
//!
//! ```ini
//! [download]
//! url = https://example.com/app.zip
//! storage_dir = /home/user/.local/share/fetchstage
//! base_name = app
//! timeout_secs = 300
//! chunk_size = 8192
//!
//! [install]
//! payload_extension = apk
//! command = adb install -r
//!
//! [logging]
//! level = info
//! directory = /home/user/.local/state/fetchstage
//! ```
//!
//! Missing keys fall back to their defaults, so a partial file is valid.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::{Ini, Properties};
use thiserror::Error;

use crate::logging::LoggingConfig;
use crate::manager::{ArtifactLayout, ManagerConfig, DEFAULT_CHUNK_SIZE, DEFAULT_TIMEOUT_SECS};

/// Directory name used under the platform config and data directories.
const APP_DIR: &str = "fetchstage";

/// Configuration file name.
const CONFIG_FILE_NAME: &str = "config.ini";

/// Errors raised while reading or writing the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access config file {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("failed to parse config file {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    #[error("invalid value '{value}' for {section}.{key}")]
    InvalidValue {
        section: &'static str,
        key: &'static str,
        value: String,
    },
}

/// Path of the user configuration file.
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join(CONFIG_FILE_NAME)
}

/// Default storage directory for downloaded artifacts.
pub fn default_storage_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR)
}

/// Format a byte count for display (e.g. `1.5 MB`).
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    if bytes < 1024 {
        return format!("{} B", bytes);
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

/// `[download]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadSettings {
    /// Artifact URL; the CLI requires it here or on the command line.
    pub url: Option<String>,
    pub storage_dir: PathBuf,
    pub base_name: String,
    pub timeout_secs: u64,
    pub chunk_size: usize,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            url: None,
            storage_dir: default_storage_dir(),
            base_name: "artifact".to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// `[install]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallSettings {
    pub payload_extension: String,
    /// Installer program and leading arguments, whitespace separated on disk.
    pub command: Option<Vec<String>>,
}

impl Default for InstallSettings {
    fn default() -> Self {
        Self {
            payload_extension: "apk".to_string(),
            command: None,
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    pub level: String,
    /// When set, logs are also written to a file in this directory.
    pub directory: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
        }
    }
}

/// Parsed configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    pub download: DownloadSettings,
    pub install: InstallSettings,
    pub logging: LoggingSettings,
}

impl ConfigFile {
    /// Load from the default location, returning defaults if the file is absent.
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_file_path();
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load from `path`.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_file(path).map_err(|e| match e {
            ini::Error::Io(source) => ConfigError::Io {
                path: path.to_path_buf(),
                source,
            },
            ini::Error::Parse(e) => ConfigError::Parse {
                path: path.to_path_buf(),
                reason: e.to_string(),
            },
        })?;
        Self::from_ini(&ini)
    }

    /// Save to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&config_file_path())
    }

    /// Save to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        self.to_ini().write_to_file(path).map_err(io_err)
    }

    /// Build the library configuration from these settings.
    pub fn to_manager_config(&self) -> ManagerConfig {
        let layout = ArtifactLayout::new(&self.download.storage_dir, &self.download.base_name)
            .with_payload_extension(&self.install.payload_extension);

        let config = ManagerConfig::new(layout)
            .with_timeout(Duration::from_secs(self.download.timeout_secs))
            .with_chunk_size(self.download.chunk_size);

        match &self.install.command {
            Some(command) => config.with_install_command(command.clone()),
            None => config,
        }
    }

    /// Logging settings in the form [`crate::logging::init_logging`] expects.
    pub fn logging_config(&self) -> LoggingConfig {
        LoggingConfig {
            level: self.logging.level.clone(),
            directory: self.logging.directory.clone(),
            ..LoggingConfig::default()
        }
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(section) = ini.section(Some("download")) {
            let d = &mut config.download;
            d.url = non_empty(section, "url");
            if let Some(dir) = non_empty(section, "storage_dir") {
                d.storage_dir = PathBuf::from(dir);
            }
            if let Some(name) = non_empty(section, "base_name") {
                d.base_name = name;
            }
            if let Some(secs) = parse_value(section, "download", "timeout_secs")? {
                d.timeout_secs = secs;
            }
            if let Some(size) = parse_value::<usize>(section, "download", "chunk_size")? {
                if size == 0 {
                    return Err(ConfigError::InvalidValue {
                        section: "download",
                        key: "chunk_size",
                        value: "0".to_string(),
                    });
                }
                d.chunk_size = size;
            }
        }

        if let Some(section) = ini.section(Some("install")) {
            if let Some(ext) = non_empty(section, "payload_extension") {
                config.install.payload_extension = ext.trim_start_matches('.').to_string();
            }
            config.install.command = non_empty(section, "command")
                .map(|c| c.split_whitespace().map(str::to_string).collect());
        }

        if let Some(section) = ini.section(Some("logging")) {
            if let Some(level) = non_empty(section, "level") {
                config.logging.level = level;
            }
            config.logging.directory = non_empty(section, "directory").map(PathBuf::from);
        }

        Ok(config)
    }

    fn to_ini(&self) -> Ini {
        let mut ini = Ini::new();

        let d = &self.download;
        ini.with_section(Some("download"))
            .set("url", d.url.clone().unwrap_or_default())
            .set("storage_dir", d.storage_dir.to_string_lossy())
            .set("base_name", d.base_name.as_str())
            .set("timeout_secs", d.timeout_secs.to_string())
            .set("chunk_size", d.chunk_size.to_string());

        ini.with_section(Some("install"))
            .set("payload_extension", self.install.payload_extension.as_str())
            .set(
                "command",
                self.install
                    .command
                    .as_ref()
                    .map(|c| c.join(" "))
                    .unwrap_or_default(),
            );

        ini.with_section(Some("logging"))
            .set("level", self.logging.level.as_str())
            .set(
                "directory",
                self.logging
                    .directory
                    .as_ref()
                    .map(|p| p.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            );

        ini
    }
}

/// Trimmed value of `key`, treating empty strings as unset.
fn non_empty(section: &Properties, key: &str) -> Option<String> {
    section
        .get(key)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn parse_value<T: FromStr>(
    section: &Properties,
    section_name: &'static str,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    match non_empty(section, key) {
        None => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                section: section_name,
                key,
                value: raw,
            }),
    }
}

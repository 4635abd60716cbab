//! Status command - show what is on disk for the configured artifact.

use std::fs;
use std::path::Path;

use console::style;
use fetchstage::config::{format_size, ConfigFile};
use fetchstage::manager::ArtifactLayout;

use super::common::{resolve_manager_config, LayoutArgs};
use crate::error::CliError;

/// Where an artifact currently stands on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactStatus {
    /// Bytes in the partial download, if one exists.
    pub partial_bytes: Option<u64>,
    /// Size of the finished archive, if it has not been extracted yet.
    pub archive_bytes: Option<u64>,
    /// Whether the extraction directory exists.
    pub extracted: bool,
    /// Whether the installable payload exists.
    pub payload_present: bool,
}

impl ArtifactStatus {
    /// Inspect the files described by `layout`.
    pub fn inspect(layout: &ArtifactLayout) -> Self {
        Self {
            partial_bytes: file_len(&layout.partial_path()),
            archive_bytes: file_len(&layout.archive_path()),
            extracted: layout.extract_dir().is_dir(),
            payload_present: layout.payload_path().is_file(),
        }
    }

    /// One-line summary of the next step.
    pub fn summary(&self) -> &'static str {
        if self.payload_present {
            "ready to install"
        } else if self.archive_bytes.is_some() {
            "downloaded, not extracted"
        } else if self.partial_bytes.is_some() {
            "partial download, resumable"
        } else if self.extracted {
            "extracted, payload missing"
        } else {
            "not downloaded"
        }
    }
}

fn file_len(path: &Path) -> Option<u64> {
    fs::metadata(path).ok().filter(|m| m.is_file()).map(|m| m.len())
}

/// Run the status command.
pub fn run(layout_args: &LayoutArgs, config: &ConfigFile) -> Result<(), CliError> {
    let manager_config = resolve_manager_config(config, layout_args);
    let layout = &manager_config.layout;
    let status = ArtifactStatus::inspect(layout);

    println!("Artifact: {}", style(&layout.base_name).bold());
    println!("  Storage:    {}", layout.storage_dir.display());
    println!(
        "  URL:        {}",
        config.download.url.as_deref().unwrap_or("(not set)")
    );
    println!(
        "  Partial:    {}",
        status
            .partial_bytes
            .map(format_size)
            .unwrap_or_else(|| "none".to_string())
    );
    println!(
        "  Archive:    {}",
        status
            .archive_bytes
            .map(format_size)
            .unwrap_or_else(|| "none".to_string())
    );
    println!(
        "  Extracted:  {}",
        if status.extracted { "yes" } else { "no" }
    );
    println!(
        "  Payload:    {} ({})",
        layout.payload_path().display(),
        if status.payload_present { "present" } else { "missing" }
    );
    println!();
    println!("Status: {}", style(status.summary()).cyan());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_nothing_on_disk() {
        let temp = TempDir::new().unwrap();
        let status = ArtifactStatus::inspect(&ArtifactLayout::new(temp.path(), "app"));

        assert_eq!(status.partial_bytes, None);
        assert_eq!(status.summary(), "not downloaded");
    }

    #[test]
    fn test_partial_is_reported() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("app.zip.part"), vec![0u8; 1234]).unwrap();

        let status = ArtifactStatus::inspect(&ArtifactLayout::new(temp.path(), "app"));
        assert_eq!(status.partial_bytes, Some(1234));
        assert_eq!(status.summary(), "partial download, resumable");
    }

    #[test]
    fn test_payload_present() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("app")).unwrap();
        fs::write(temp.path().join("app").join("app.apk"), b"apk").unwrap();

        let status = ArtifactStatus::inspect(&ArtifactLayout::new(temp.path(), "app"));
        assert!(status.extracted);
        assert_eq!(status.summary(), "ready to install");
    }
}

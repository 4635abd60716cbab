//! Clean command - remove the partial download, archive and extracted files.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use fetchstage::config::{format_size, ConfigFile};
use fetchstage::manager::{ArtifactLayout, TransferState};
use tracing::info;

use super::common::{resolve_manager_config, LayoutArgs};
use crate::error::CliError;

/// What a clean removed.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CleanReport {
    pub removed: Vec<PathBuf>,
    pub bytes_freed: u64,
}

/// Remove every file the pipeline may have produced for `layout`.
///
/// Paths that do not exist are skipped.
pub fn clean_layout(layout: &ArtifactLayout) -> Result<CleanReport, CliError> {
    let mut report = CleanReport::default();

    let mut transfer = TransferState::new(layout.archive_path())?;
    if transfer.partial_path.is_file() {
        let bytes = transfer.resume_offset();
        transfer.discard_partial()?;
        info!(path = %transfer.partial_path.display(), "Removed");
        report.bytes_freed += bytes;
        report.removed.push(transfer.partial_path.clone());
    }

    let archive = layout.archive_path();
    if let Ok(meta) = fs::metadata(&archive) {
        remove(&archive, fs::remove_file(&archive))?;
        report.bytes_freed += meta.len();
        report.removed.push(archive);
    }

    let dir = layout.extract_dir();
    if dir.is_dir() {
        report.bytes_freed += dir_size(&dir);
        remove(&dir, fs::remove_dir_all(&dir))?;
        report.removed.push(dir);
    }

    Ok(report)
}

fn remove(path: &Path, result: io::Result<()>) -> Result<(), CliError> {
    match result {
        Ok(()) => {
            info!(path = %path.display(), "Removed");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(CliError::Clean {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

fn dir_size(dir: &Path) -> u64 {
    let Ok(entries) = fs::read_dir(dir) else {
        return 0;
    };
    entries
        .flatten()
        .map(|entry| match entry.file_type() {
            Ok(t) if t.is_dir() => dir_size(&entry.path()),
            Ok(_) => entry.metadata().map(|m| m.len()).unwrap_or(0),
            Err(_) => 0,
        })
        .sum()
}

/// Run the clean command.
pub fn run(layout_args: &LayoutArgs, config: &ConfigFile) -> Result<(), CliError> {
    let manager_config = resolve_manager_config(config, layout_args);
    let report = clean_layout(&manager_config.layout)?;

    if report.removed.is_empty() {
        println!("Nothing to clean.");
        return Ok(());
    }

    for path in &report.removed {
        println!("Removed {}", path.display());
    }
    println!("Freed {}", format_size(report.bytes_freed));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_clean_removes_everything() {
        let temp = TempDir::new().unwrap();
        let layout = ArtifactLayout::new(temp.path(), "app");
        fs::write(layout.partial_path(), vec![0u8; 100]).unwrap();
        fs::create_dir_all(layout.extract_dir().join("res")).unwrap();
        fs::write(layout.extract_dir().join("res").join("a.txt"), vec![0u8; 50]).unwrap();

        let report = clean_layout(&layout).unwrap();

        assert_eq!(report.removed.len(), 2);
        assert_eq!(report.bytes_freed, 150);
        assert!(!layout.partial_path().exists());
        assert!(!layout.extract_dir().exists());
    }

    #[test]
    fn test_clean_removes_archive_and_empty_partial() {
        let temp = TempDir::new().unwrap();
        let layout = ArtifactLayout::new(temp.path(), "app");
        fs::write(layout.partial_path(), b"").unwrap();
        fs::write(layout.archive_path(), vec![0u8; 40]).unwrap();

        let report = clean_layout(&layout).unwrap();

        assert_eq!(
            report.removed,
            vec![layout.partial_path(), layout.archive_path()]
        );
        assert_eq!(report.bytes_freed, 40);
        assert!(!layout.partial_path().exists());
        assert!(!layout.archive_path().exists());
    }

    #[test]
    fn test_clean_with_nothing_on_disk() {
        let temp = TempDir::new().unwrap();
        let report = clean_layout(&ArtifactLayout::new(temp.path(), "app")).unwrap();
        assert_eq!(report, CleanReport::default());
    }
}

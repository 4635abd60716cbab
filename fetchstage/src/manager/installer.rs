//! Hand-off of an extracted payload to the platform installer.
//!
//! The installer itself is an external collaborator. This module locates the
//! payload inside the extraction directory, asks the [`Installer`] whether it
//! can handle it, and dispatches the install action.

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{info, warn};

use super::error::{ManagerError, ManagerResult};
use super::traits::Installer;

/// Installer that runs an external program with the payload path appended.
///
/// For example `["adb", "install", "-r"]` runs `adb install -r <payload>`.
#[derive(Debug, Clone)]
pub struct CommandInstaller {
    program: String,
    args: Vec<String>,
}

impl CommandInstaller {
    /// Create an installer for `program` with leading `args`.
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Build from a full command line (`program arg...`).
    ///
    /// Returns `None` for an empty command.
    pub fn from_command(command: &[String]) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(Self::new(program.clone(), args.to_vec()))
    }

    /// The program that will be run.
    pub fn program(&self) -> &str {
        &self.program
    }
}

impl Installer for CommandInstaller {
    fn is_available(&self, _payload: &Path) -> bool {
        find_program(&self.program).is_some()
    }

    fn install(&self, payload: &Path) -> ManagerResult<()> {
        info!(program = %self.program, payload = %payload.display(), "Dispatching installer");

        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(payload)
            .status()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ManagerError::InstallerUnavailable(format!("{} not found", self.program))
                } else {
                    ManagerError::InstallFailed {
                        path: payload.to_path_buf(),
                        reason: format!("failed to run {}: {}", self.program, e),
                    }
                }
            })?;

        if !status.success() {
            return Err(ManagerError::InstallFailed {
                path: payload.to_path_buf(),
                reason: format!("{} exited with {}", self.program, status),
            });
        }

        Ok(())
    }
}

/// Installer used when nothing is configured: never available.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoInstaller;

impl Installer for NoInstaller {
    fn is_available(&self, _payload: &Path) -> bool {
        false
    }

    fn install(&self, _payload: &Path) -> ManagerResult<()> {
        Err(ManagerError::InstallerUnavailable(
            "no install command configured".to_string(),
        ))
    }
}

/// Check that the payload exists and hand it to `installer`.
pub fn hand_off<I: Installer + ?Sized>(installer: &I, payload: &Path) -> ManagerResult<()> {
    if !payload.is_file() {
        warn!(payload = %payload.display(), "Installable payload missing after extraction");
        return Err(ManagerError::ArtifactNotFound(payload.to_path_buf()));
    }

    if !installer.is_available(payload) {
        return Err(ManagerError::InstallerUnavailable(format!(
            "no handler can install {}",
            payload.display()
        )));
    }

    installer.install(payload)
}

/// Resolve `program` to an executable path.
///
/// Names containing a path separator are checked directly; bare names are
/// looked up on `PATH`.
fn find_program(program: &str) -> Option<PathBuf> {
    if program.is_empty() {
        return None;
    }

    let direct = Path::new(program);
    if direct.components().count() > 1 {
        return direct.is_file().then(|| direct.to_path_buf());
    }

    let path_var = env::var_os("PATH")?;
    env::split_paths(&path_var).find_map(|dir| {
        let candidate = dir.join(program);
        if candidate.is_file() {
            return Some(candidate);
        }
        let with_suffix = dir.join(format!("{}{}", program, env::consts::EXE_SUFFIX));
        with_suffix.is_file().then_some(with_suffix)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_from_command() {
        let cmd = vec!["adb".to_string(), "install".to_string(), "-r".to_string()];
        let installer = CommandInstaller::from_command(&cmd).unwrap();
        assert_eq!(installer.program(), "adb");
        assert_eq!(installer.args, vec!["install", "-r"]);

        assert!(CommandInstaller::from_command(&[]).is_none());
    }

    #[test]
    fn test_missing_payload_is_artifact_not_found() {
        let temp = TempDir::new().unwrap();
        let payload = temp.path().join("app.apk");

        let err = hand_off(&NoInstaller, &payload).unwrap_err();
        assert!(matches!(err, ManagerError::ArtifactNotFound(p) if p == payload));
    }

    #[test]
    fn test_no_installer_is_unavailable() {
        let temp = TempDir::new().unwrap();
        let payload = temp.path().join("app.apk");
        fs::write(&payload, b"apk").unwrap();

        let err = hand_off(&NoInstaller, &payload).unwrap_err();
        assert!(matches!(err, ManagerError::InstallerUnavailable(_)));
    }

    #[test]
    fn test_unknown_program_is_unavailable() {
        let temp = TempDir::new().unwrap();
        let payload = temp.path().join("app.apk");
        fs::write(&payload, b"apk").unwrap();

        let installer = CommandInstaller::new("definitely-not-a-real-installer-xyz", vec![]);
        let err = hand_off(&installer, &payload).unwrap_err();
        assert!(matches!(err, ManagerError::InstallerUnavailable(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_command_receives_payload_path() {
        let temp = TempDir::new().unwrap();
        let payload = temp.path().join("app.apk");
        let marker = temp.path().join("installed");
        fs::write(&payload, b"apk").unwrap();

        let script = format!("cp \"$0\" \"{}\"", marker.display());
        let installer = CommandInstaller::new("sh", vec!["-c".to_string(), script]);
        hand_off(&installer, &payload).unwrap();

        assert_eq!(fs::read(&marker).unwrap(), b"apk");
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_command_is_install_failed() {
        let temp = TempDir::new().unwrap();
        let payload = temp.path().join("app.apk");
        fs::write(&payload, b"apk").unwrap();

        let installer = CommandInstaller::new("sh", vec!["-c".to_string(), "exit 3".to_string()]);
        let err = hand_off(&installer, &payload).unwrap_err();
        assert!(matches!(err, ManagerError::InstallFailed { .. }));
    }
}

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::{Result, UpdateError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    /// The new binary is in place.
    Replaced,
    /// The swap happens after this process exits.
    Pending,
}

/// Puts a verified download in place of the installed executable.
pub trait Installer {
    fn install(&self, staged: NamedTempFile, target: &Path) -> io::Result<InstallOutcome>;
}

/// Atomic rename over the running executable (unix).
pub struct RenameInstaller;

impl Installer for RenameInstaller {
    fn install(&self, staged: NamedTempFile, target: &Path) -> io::Result<InstallOutcome> {
        make_executable(staged.path())?;
        staged.persist(target).map_err(|e| e.error)?;
        Ok(InstallOutcome::Replaced)
    }
}

/// Windows refuses to overwrite a running executable, so the new binary is
/// parked next to it and a detached script swaps it in once we exit.
pub struct DeferredInstaller;

impl Installer for DeferredInstaller {
    fn install(&self, staged: NamedTempFile, target: &Path) -> io::Result<InstallOutcome> {
        let parked = sibling(target, ".new");
        staged.persist(&parked).map_err(|e| e.error)?;

        let script_path = std::env::temp_dir().join(format!("motd-update-{}.cmd", std::process::id()));
        let script = deferred_script(std::process::id(), &parked, target, &backup_path(target));
        fs::write(&script_path, script)?;

        std::process::Command::new("cmd")
            .arg("/C")
            .arg("start")
            .arg("")
            .arg("/B")
            .arg(&script_path)
            .spawn()?;
        Ok(InstallOutcome::Pending)
    }
}

pub fn installer_for_platform() -> Box<dyn Installer> {
    if cfg!(windows) {
        Box::new(DeferredInstaller)
    } else {
        Box::new(RenameInstaller)
    }
}

pub fn backup_path(target: &Path) -> PathBuf {
    sibling(target, ".bak")
}

fn sibling(target: &Path, suffix: &str) -> PathBuf {
    let mut name = target.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// Waits for `pid` to exit, moves `parked` over `target`, then deletes the
/// backup and the script itself.
fn deferred_script(pid: u32, parked: &Path, target: &Path, backup: &Path) -> String {
    format!(
        "@echo off\r\n\
         :wait\r\n\
         tasklist /FI \"PID eq {pid}\" 2>NUL | find \"{pid}\" >NUL\r\n\
         if not errorlevel 1 (\r\n\
         \x20 timeout /T 1 /NOBREAK >NUL\r\n\
         \x20 goto wait\r\n\
         )\r\n\
         move /Y \"{parked}\" \"{target}\" >NUL\r\n\
         del \"{backup}\" >NUL 2>&1\r\n\
         del \"%~f0\"\r\n",
        pid = pid,
        parked = parked.display(),
        target = target.display(),
        backup = backup.display(),
    )
}

#[cfg(unix)]
fn make_executable(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms)
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> io::Result<()> {
    Ok(())
}

/// Backs up `target`, hands `staged` to the installer and restores the
/// backup if installation fails.
pub fn apply(installer: &dyn Installer, staged: NamedTempFile, target: &Path) -> Result<InstallOutcome> {
    let backup = backup_path(target);
    fs::copy(target, &backup)?;
    tracing::debug!("backed up {} to {}", target.display(), backup.display());

    match installer.install(staged, target) {
        Ok(InstallOutcome::Replaced) => {
            if let Err(e) = fs::remove_file(&backup) {
                tracing::warn!("could not remove backup {}: {}", backup.display(), e);
            }
            Ok(InstallOutcome::Replaced)
        }
        Ok(InstallOutcome::Pending) => Ok(InstallOutcome::Pending),
        Err(install) => {
            tracing::debug!("install failed ({}), restoring backup", install);
            match fs::rename(&backup, target) {
                Ok(()) => Err(UpdateError::RolledBack(install)),
                Err(rollback) => Err(UpdateError::RollbackFailed {
                    install,
                    rollback,
                    backup: backup.display().to_string(),
                }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn staged_with(dir: &Path, content: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new_in(dir).unwrap();
        file.write_all(content).unwrap();
        file
    }

    /// Scribbles over the target, then fails.
    struct CorruptingInstaller;

    impl Installer for CorruptingInstaller {
        fn install(&self, _staged: NamedTempFile, target: &Path) -> io::Result<InstallOutcome> {
            fs::write(target, b"half-written")?;
            Err(io::Error::new(io::ErrorKind::Other, "disk full"))
        }
    }

    /// Loses the backup before failing, so nothing can be restored.
    struct BackupLosingInstaller;

    impl Installer for BackupLosingInstaller {
        fn install(&self, _staged: NamedTempFile, target: &Path) -> io::Result<InstallOutcome> {
            fs::remove_file(backup_path(target))?;
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"))
        }
    }

    /// Parks the download beside the target and leaves the swap for later.
    struct ParkingInstaller;

    impl Installer for ParkingInstaller {
        fn install(&self, staged: NamedTempFile, target: &Path) -> io::Result<InstallOutcome> {
            staged.persist(sibling(target, ".new")).map_err(|e| e.error)?;
            Ok(InstallOutcome::Pending)
        }
    }

    #[test]
    fn pending_install_keeps_backup_and_target() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("motd");
        fs::write(&target, b"old").unwrap();

        let outcome = apply(&ParkingInstaller, staged_with(dir.path(), b"new"), &target).unwrap();

        assert_eq!(outcome, InstallOutcome::Pending);
        assert_eq!(fs::read(&target).unwrap(), b"old");
        assert_eq!(fs::read(backup_path(&target)).unwrap(), b"old");
        assert_eq!(fs::read(sibling(&target, ".new")).unwrap(), b"new");
    }

    #[test]
    fn rename_install_replaces_and_drops_backup() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("motd");
        fs::write(&target, b"old").unwrap();

        let staged = staged_with(dir.path(), b"new");
        let outcome = apply(&RenameInstaller, staged, &target).unwrap();

        assert_eq!(outcome, InstallOutcome::Replaced);
        assert_eq!(fs::read(&target).unwrap(), b"new");
        assert!(!backup_path(&target).exists());
    }

    #[cfg(unix)]
    #[test]
    fn installed_binary_is_executable() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("motd");
        fs::write(&target, b"old").unwrap();

        apply(&RenameInstaller, staged_with(dir.path(), b"new"), &target).unwrap();
        let mode = fs::metadata(&target).unwrap().permissions().mode();
        assert_eq!(mode & 0o111, 0o111);
    }

    #[test]
    fn failed_install_restores_original_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("motd");
        let original = b"\x7fELF original binary".to_vec();
        fs::write(&target, &original).unwrap();

        let err = apply(&CorruptingInstaller, staged_with(dir.path(), b"new"), &target).unwrap_err();

        assert!(matches!(err, UpdateError::RolledBack(_)));
        assert_eq!(fs::read(&target).unwrap(), original);
        assert!(!backup_path(&target).exists());
    }

    #[test]
    fn failed_rollback_reports_both_errors() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("motd");
        fs::write(&target, b"old").unwrap();

        let err = apply(&BackupLosingInstaller, staged_with(dir.path(), b"new"), &target).unwrap_err();

        match err {
            UpdateError::RollbackFailed { install, rollback, .. } => {
                assert_eq!(install.kind(), io::ErrorKind::PermissionDenied);
                assert_eq!(rollback.kind(), io::ErrorKind::NotFound);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_target_fails_before_install() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("absent");
        let err = apply(&RenameInstaller, staged_with(dir.path(), b"new"), &target).unwrap_err();
        assert!(matches!(err, UpdateError::Io(_)));
        assert!(!target.exists());
    }

    #[test]
    fn deferred_script_moves_parked_binary() {
        let script = deferred_script(
            42,
            Path::new(r"C:\bin\motd.exe.new"),
            Path::new(r"C:\bin\motd.exe"),
            Path::new(r"C:\bin\motd.exe.bak"),
        );
        assert!(script.contains("PID eq 42"));
        assert!(script.contains(r#"move /Y "C:\bin\motd.exe.new" "C:\bin\motd.exe""#));
        assert!(script.contains(r#"del "C:\bin\motd.exe.bak""#));
    }

    #[test]
    fn sibling_paths_append_suffix() {
        assert_eq!(backup_path(Path::new("/usr/local/bin/motd")), PathBuf::from("/usr/local/bin/motd.bak"));
    }
}

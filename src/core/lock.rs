//! Single-instance lock
//!
//! The lock is a plain file created with `create_new`, so acquisition is atomic
//! on every filesystem the bot runs on. The holder's PID and start time are
//! written inside for operators. A crashed process leaves the file behind and
//! the next start refuses to run until it is removed by hand.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::core::error::{AppError, AppResult};

/// Held for the lifetime of the process; dropping it removes the lock file.
#[derive(Debug)]
pub struct InstanceLock {
    path: PathBuf,
}

impl InstanceLock {
    /// Acquire the lock at `path`, failing with [`AppError::InstanceLocked`] if it is held.
    pub fn acquire(path: impl Into<PathBuf>) -> AppResult<Self> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs_err::create_dir_all(parent)?;
            }
        }

        match fs_err::OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                writeln!(file, "{}", std::process::id())?;
                writeln!(file, "{}", chrono::Utc::now().to_rfc3339())?;
                log::info!("🔒 Instance lock acquired: {}", path.display());
                Ok(Self { path })
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let pid = Self::holder_pid(&path)
                    .map(|pid| pid.to_string())
                    .unwrap_or_else(|| "unknown".to_string());
                Err(AppError::InstanceLocked { path, pid })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// PID recorded in an existing lock file, if readable.
    pub fn holder_pid(path: &Path) -> Option<u32> {
        std::fs::read_to_string(path)
            .ok()?
            .lines()
            .next()
            .and_then(|line| line.trim().parse().ok())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => log::info!("🔓 Instance lock released: {}", self.path.display()),
            Err(e) => log::warn!("Failed to remove lock file {}: {}", self.path.display(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_acquire_writes_pid() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bot.lock");

        let lock = InstanceLock::acquire(&path).unwrap();
        assert!(path.exists());
        assert_eq!(InstanceLock::holder_pid(&path), Some(std::process::id()));
        assert_eq!(lock.path(), path.as_path());
    }

    #[test]
    fn test_second_acquire_fails_while_held() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bot.lock");

        let _held = InstanceLock::acquire(&path).unwrap();
        let err = InstanceLock::acquire(&path).unwrap_err();
        match err {
            AppError::InstanceLocked { path: p, pid } => {
                assert_eq!(p, path);
                assert_eq!(pid, std::process::id().to_string());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_drop_releases_lock() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bot.lock");

        drop(InstanceLock::acquire(&path).unwrap());
        assert!(!path.exists());
        assert!(InstanceLock::acquire(&path).is_ok());
    }

    #[test]
    fn test_stale_lock_is_not_stolen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bot.lock");
        std::fs::write(&path, "not-a-pid\n").unwrap();

        let err = InstanceLock::acquire(&path).unwrap_err();
        assert!(matches!(err, AppError::InstanceLocked { ref pid, .. } if pid == "unknown"));
        assert!(path.exists());
    }

    #[test]
    fn test_creates_parent_directory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run").join("bot.lock");
        let _lock = InstanceLock::acquire(&path).unwrap();
        assert!(path.exists());
    }
}

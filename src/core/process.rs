//! Process execution utilities with timeout support
//!
//! Helpers for short-lived external commands (`yt-dlp --version`) and for
//! locating the JavaScript runtime yt-dlp needs for signature challenges.

use std::path::PathBuf;
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;

use crate::core::config;
use crate::core::error::AppError;

/// Default timeout for version probes
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(15);

/// Run an async Command with a timeout.
///
/// Returns the process Output on success, or an AppError on timeout/IO failure.
pub async fn run_with_timeout(cmd: &mut Command, timeout: Duration) -> Result<Output, AppError> {
    cmd.kill_on_drop(true);
    match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) => Err(AppError::Io(e)),
        Err(_) => Err(AppError::Validation(format!(
            "Process timed out after {}s",
            timeout.as_secs()
        ))),
    }
}

/// Reports the installed yt-dlp version, e.g. `2025.01.15`.
pub async fn ytdlp_version(bin: &str) -> Result<String, AppError> {
    let output = run_with_timeout(Command::new(bin).arg("--version"), PROBE_TIMEOUT).await?;
    if !output.status.success() {
        return Err(AppError::Validation(format!(
            "{} --version exited with {}",
            bin, output.status
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Looks up an executable by name in the directories of `PATH`.
pub fn find_in_path(bin: &str) -> Option<PathBuf> {
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(bin))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &std::path::Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &std::path::Path) -> bool {
    path.is_file()
}

/// A JavaScript runtime found on `PATH`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsRuntime {
    pub name: &'static str,
    pub path: PathBuf,
}

/// First available runtime from [`config::download::JS_RUNTIMES`].
pub fn detect_js_runtime() -> Option<JsRuntime> {
    config::download::JS_RUNTIMES
        .iter()
        .find_map(|&name| find_in_path(name).map(|path| JsRuntime { name, path }))
}

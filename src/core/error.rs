use std::path::PathBuf;

use thiserror::Error;

use crate::download::error::DownloadError;

/// Centralized error types for the application
///
/// Everything outside the download pipeline funnels into this enum; download
/// failures keep their own taxonomy in [`DownloadError`] and are wrapped here.
#[derive(Error, Debug)]
pub enum AppError {
    /// Telegram API errors
    #[error("Telegram error: {0}")]
    Telegram(#[from] teloxide::RequestError),

    /// Download pipeline errors
    #[error("Download error: {0}")]
    Download(#[from] DownloadError),

    /// HTTP/Fetch errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// HTTP status code errors
    #[error("HTTP request failed with status: {0}")]
    HttpStatus(reqwest::StatusCode),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// URL parsing errors
    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),

    /// JSON (token files, host API responses)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Another process holds the instance lock
    #[error("Another instance is already running (lock file {}, pid {pid}); remove the file if that process is gone", .path.display())]
    InstanceLocked { path: PathBuf, pid: String },

    /// Anyhow errors (for general error handling)
    #[error("Application error: {0}")]
    Anyhow(#[from] anyhow::Error),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;

impl From<String> for AppError {
    fn from(err: String) -> Self {
        AppError::Validation(err)
    }
}

impl From<&str> for AppError {
    fn from(err: &str) -> Self {
        AppError::Validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_locked_message_names_path_and_pid() {
        let err = AppError::InstanceLocked {
            path: PathBuf::from("/tmp/mediarelay.lock"),
            pid: "4242".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("/tmp/mediarelay.lock"));
        assert!(text.contains("4242"));
    }

    #[test]
    fn test_download_error_converts() {
        let err: AppError = DownloadError::Network("connection reset".into()).into();
        assert!(matches!(err, AppError::Download(DownloadError::Network(_))));
    }

    #[test]
    fn test_from_str() {
        let err: AppError = "bad input".into();
        assert!(matches!(err, AppError::Validation(_)));
    }
}

use indoc::formatdoc;
use thiserror::Error;

use crate::download::platform::Platform;
use crate::download::ytdlp_errors::YtDlpErrorType;

/// Structured error type for the download pipeline.
///
/// Every variant maps to exactly one user-facing message through
/// [`user_message`](DownloadError::user_message); the raw detail stays in the logs.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// No registered platform matches the URL
    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),

    /// The platform demands a signed-in session and none is usable
    #[error("{platform} requires authentication: {reason}")]
    AuthRequired { platform: Platform, reason: String },

    /// No playable stream after the persona ladder ended
    #[error("{platform} extraction failed after {attempts} attempt(s) ({}): {detail}", .kind.as_str())]
    Extraction {
        platform: Platform,
        kind: YtDlpErrorType,
        attempts: usize,
        detail: String,
    },

    /// Transient connection failure
    #[error("network error: {0}")]
    Network(String),

    /// File host unavailable or rejected the upload
    #[error("upload failed: {0}")]
    Upload(String),

    /// Download or processing timed out after this many seconds
    #[error("timed out after {0}s")]
    Timeout(u64),

    /// Expected file not found after extraction
    #[error("output file not found: {0}")]
    FileNotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DownloadError {
    /// Returns category for logs
    pub fn category(&self) -> &'static str {
        match self {
            DownloadError::UnsupportedPlatform(_) => "unsupported_platform",
            DownloadError::AuthRequired { .. } => "auth_required",
            DownloadError::Extraction { .. } => "extraction",
            DownloadError::Network(_) => "network",
            DownloadError::Upload(_) => "upload",
            DownloadError::Timeout(_) => "timeout",
            DownloadError::FileNotFound(_) => "file_not_found",
            DownloadError::Io(_) => "io",
        }
    }

    /// The single message shown to the user, including a remediation hint.
    pub fn user_message(&self) -> String {
        match self {
            DownloadError::UnsupportedPlatform(_) => {
                "❌ This platform is not supported.\n\nSupported: YouTube, Instagram, Facebook, TikTok.".to_string()
            }
            DownloadError::AuthRequired {
                platform: Platform::Instagram,
                ..
            } => formatdoc! {"
                ❌ Instagram requires cookies for photos and posts.

                The bot has no signed-in Instagram session right now. Ask the operator to refresh the cookies, then try again."},
            DownloadError::AuthRequired { platform, .. } => formatdoc! {"
                ❌ {platform} asked for a signed-in session.

                The bot's {platform} credentials are missing or expired. Ask the operator to refresh them, then try again."},
            DownloadError::Extraction { platform, kind, .. } => extraction_message(*platform, *kind),
            DownloadError::Network(_) => "❌ Network problem.\n\nTry again in a minute.".to_string(),
            DownloadError::Timeout(_) => {
                "❌ The download took too long.\n\nTry a lower quality or try again later.".to_string()
            }
            DownloadError::Upload(_) => {
                "❌ The file was downloaded but is too large for Telegram, and the upload to the file host failed.\n\nTry again later or pick a lower quality.".to_string()
            }
            DownloadError::FileNotFound(_) | DownloadError::Io(_) => {
                "❌ Something went wrong while saving the file.\n\nPlease try again.".to_string()
            }
        }
    }
}

fn extraction_message(platform: Platform, kind: YtDlpErrorType) -> String {
    match (platform, kind) {
        (Platform::Facebook, YtDlpErrorType::ParseFailure) => formatdoc! {"
            ❌ Facebook did not return this video.

            Reels shared through share links are often only visible to signed-in users. Open the reel, copy the link from the address bar and try again."},
        (_, YtDlpErrorType::Unavailable) => {
            "❌ This content is unavailable.\n\nIt may be private, removed or blocked in the bot's region.".to_string()
        }
        (_, YtDlpErrorType::NoUsableStreams) => {
            format!("❌ {platform} returned no downloadable audio or video for this link.\n\nTry another item.")
        }
        (_, YtDlpErrorType::BotDetection) => {
            format!("❌ {platform} is blocking requests right now.\n\nWait a few minutes or try another item.")
        }
        (_, YtDlpErrorType::ToolUnavailable) => {
            "❌ The downloader is not available on the server.\n\nThe operator has been notified in the logs.".to_string()
        }
        _ => format!("❌ Could not download from {platform}.\n\nCheck the link, wait a bit, or try another item."),
    }
}

use once_cell::sync::Lazy;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::download::credentials::CredentialPaths;

/// Cached yt-dlp binary path
/// Read once at startup from YTDL_BIN environment variable or defaults to "yt-dlp"
pub static YTDL_BIN: Lazy<String> = Lazy::new(|| env::var("YTDL_BIN").unwrap_or_else(|_| "yt-dlp".to_string()));

/// Download folder path
/// Read from DOWNLOAD_FOLDER environment variable, supports tilde (~) expansion
/// Default: downloads
pub static DOWNLOAD_FOLDER: Lazy<String> =
    Lazy::new(|| env::var("DOWNLOAD_FOLDER").unwrap_or_else(|_| "downloads".to_string()));

/// Log file path
/// Default: mediarelay.log
pub static LOG_FILE_PATH: Lazy<String> =
    Lazy::new(|| env::var("LOG_FILE_PATH").unwrap_or_else(|_| "mediarelay.log".to_string()));

/// Bot token
/// Read from TELEGRAM_BOT_TOKEN, BOT_TOKEN or TELOXIDE_TOKEN environment variable
pub static BOT_TOKEN: Lazy<String> = Lazy::new(|| {
    env::var("TELEGRAM_BOT_TOKEN")
        .or_else(|_| env::var("BOT_TOKEN"))
        .or_else(|_| env::var("TELOXIDE_TOKEN"))
        .unwrap_or_else(|_| String::new())
});

/// Custom Bot API server (local telegram-bot-api), optional
pub static BOT_API_URL: Lazy<Option<String>> = Lazy::new(|| env::var("BOT_API_URL").ok());

/// Single-instance lock file
/// Default: /tmp/mediarelay.lock
pub static LOCK_FILE_PATH: Lazy<String> =
    Lazy::new(|| env::var("LOCK_FILE_PATH").unwrap_or_else(|_| "/tmp/mediarelay.lock".to_string()));

/// Netscape cookie jar shared by Instagram and Facebook
/// Default: /tmp/cookies.txt
pub static COOKIES_FILE: Lazy<String> =
    Lazy::new(|| env::var("COOKIES_FILE").unwrap_or_else(|_| "/tmp/cookies.txt".to_string()));

/// YouTube-specific cookie jar. Falls back to COOKIES_FILE when unset.
pub static YOUTUBE_COOKIES_FILE: Lazy<Option<String>> = Lazy::new(|| env::var("YOUTUBE_COOKIES_FILE").ok());

/// OAuth token JSON produced by `mediarelay oauth setup`
/// Default: /tmp/youtube_oauth_token.json
pub static YOUTUBE_OAUTH_TOKEN_FILE: Lazy<String> = Lazy::new(|| {
    env::var("YOUTUBE_OAUTH_TOKEN_FILE").unwrap_or_else(|_| "/tmp/youtube_oauth_token.json".to_string())
});

/// Read-only mount that credential files are copied from at startup
pub static CREDENTIALS_SOURCE_DIR: Lazy<Option<String>> = Lazy::new(|| env::var("CREDENTIALS_SOURCE_DIR").ok());

/// Expands `~` and returns an owned path.
pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

fn env_u64(key: &str, default: u64) -> u64 {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            log::warn!("Ignoring invalid {}={:?}, using {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}

/// Download configuration
pub mod download {
    use super::{Duration, Lazy};

    /// Timeout for a single yt-dlp invocation (in seconds)
    pub const YTDLP_TIMEOUT_SECS: u64 = 240;

    /// Telegram Bot API upload limit
    pub const DEFAULT_MAX_INLINE_SIZE: u64 = 50 * 1024 * 1024;

    /// Files above this size go to the file host instead of the chat
    /// Read from MAX_INLINE_SIZE_BYTES
    pub static MAX_INLINE_SIZE: Lazy<u64> =
        Lazy::new(|| super::env_u64("MAX_INLINE_SIZE_BYTES", DEFAULT_MAX_INLINE_SIZE));

    /// Minimum gap between two progress message edits (milliseconds)
    pub const PROGRESS_THROTTLE_MS: u64 = 500;

    /// Cells in the rendered progress bar
    pub const PROGRESS_BAR_WIDTH: usize = 20;

    /// JavaScript runtimes yt-dlp can use for signature challenges, in preference order
    pub const JS_RUNTIMES: &[&str] = &["deno", "node"];

    /// Default height when a video is requested without an explicit quality
    pub const DEFAULT_VIDEO_HEIGHT: u32 = 720;

    /// A format keyboard nobody answered is forgotten after this long (in seconds)
    pub const PENDING_LINK_TTL_SECS: u64 = 60 * 60;

    /// Audio bitrate for extracted mp3 files
    pub const AUDIO_QUALITY: &str = "192K";

    pub fn ytdlp_timeout() -> Duration {
        Duration::from_secs(YTDLP_TIMEOUT_SECS)
    }

    pub fn progress_throttle() -> Duration {
        Duration::from_millis(PROGRESS_THROTTLE_MS)
    }
}

/// Cleanup sweeper configuration
pub mod cleanup {
    use super::{Duration, Lazy};

    /// Files older than this are removed by the periodic sweep
    /// Read from CLEANUP_RETENTION_SECS, default 30 minutes
    pub static RETENTION_SECS: Lazy<u64> = Lazy::new(|| super::env_u64("CLEANUP_RETENTION_SECS", 30 * 60));

    /// Interval between periodic sweeps
    /// Read from CLEANUP_INTERVAL_SECS, default 5 minutes
    pub static INTERVAL_SECS: Lazy<u64> = Lazy::new(|| super::env_u64("CLEANUP_INTERVAL_SECS", 5 * 60));

    pub fn retention() -> Duration {
        Duration::from_secs(*RETENTION_SECS)
    }

    pub fn interval() -> Duration {
        Duration::from_secs((*INTERVAL_SECS).max(1))
    }
}

/// Network configuration
pub mod network {
    use super::Duration;

    /// Timeout for Bot API and short HTTP calls (in seconds)
    pub const REQUEST_TIMEOUT_SECS: u64 = 30;

    /// Timeout for a file host upload (in seconds)
    pub const UPLOAD_TIMEOUT_SECS: u64 = 15 * 60;

    pub fn timeout() -> Duration {
        Duration::from_secs(REQUEST_TIMEOUT_SECS)
    }

    pub fn upload_timeout() -> Duration {
        Duration::from_secs(UPLOAD_TIMEOUT_SECS)
    }
}

/// Instagram photo fallback
pub mod instagram {
    use super::Lazy;

    pub const DEFAULT_BASE_URL: &str = "https://www.instagram.com";

    /// Site the post page is fetched from when yt-dlp finds no video
    /// Read from INSTAGRAM_BASE_URL
    pub static BASE_URL: Lazy<String> =
        Lazy::new(|| std::env::var("INSTAGRAM_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()));

    /// Browser user agent for the post page and image requests
    pub const USER_AGENT: &str =
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";
}

/// File host configuration
pub mod upload {
    use super::Lazy;

    /// gofile.io API base, overridable for self-hosted mirrors
    pub static GOFILE_API_URL: Lazy<String> =
        Lazy::new(|| std::env::var("GOFILE_API_URL").unwrap_or_else(|_| "https://api.gofile.io".to_string()));
}

/// Credential artifact checks
pub mod credentials {
    /// A credential file smaller than this is treated as absent
    pub const MIN_SIZE_BYTES: u64 = 32;
}

/// OAuth device flow (operator tooling only)
pub mod oauth {
    use super::Lazy;

    pub const DEVICE_CODE_URL: &str = "https://oauth2.googleapis.com/device/code";
    pub const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
    pub const SCOPE: &str = "https://www.googleapis.com/auth/youtube";

    pub static CLIENT_ID: Lazy<Option<String>> = Lazy::new(|| std::env::var("YOUTUBE_OAUTH_CLIENT_ID").ok());
    pub static CLIENT_SECRET: Lazy<Option<String>> =
        Lazy::new(|| std::env::var("YOUTUBE_OAUTH_CLIENT_SECRET").ok());
}

/// Snapshot of the runtime configuration owned by the application context.
#[derive(Debug, Clone)]
pub struct Settings {
    pub download_dir: PathBuf,
    pub ytdl_bin: String,
    pub max_inline_size: u64,
    pub retention: Duration,
    pub sweep_interval: Duration,
    pub extraction_timeout: Duration,
    pub lock_path: PathBuf,
    pub credentials: CredentialPaths,
    pub gofile_api_url: String,
    pub instagram_base_url: String,
}

impl Settings {
    /// Builds settings from the process environment (after `.env` is loaded).
    pub fn from_env() -> Self {
        let cookies_file = expand_path(&COOKIES_FILE);
        let youtube_cookies_file = YOUTUBE_COOKIES_FILE
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(expand_path)
            .unwrap_or_else(|| cookies_file.clone());

        Self {
            download_dir: expand_path(&DOWNLOAD_FOLDER),
            ytdl_bin: YTDL_BIN.clone(),
            max_inline_size: *download::MAX_INLINE_SIZE,
            retention: cleanup::retention(),
            sweep_interval: cleanup::interval(),
            extraction_timeout: download::ytdlp_timeout(),
            lock_path: expand_path(&LOCK_FILE_PATH),
            credentials: CredentialPaths {
                cookies_file,
                youtube_cookies_file,
                youtube_oauth_token: expand_path(&YOUTUBE_OAUTH_TOKEN_FILE),
            },
            gofile_api_url: upload::GOFILE_API_URL.clone(),
            instagram_base_url: instagram::BASE_URL.clone(),
        }
    }

    /// Settings rooted in `dir`, with every path kept inside it. Used by tests and the CLI.
    pub fn rooted_at(dir: impl Into<PathBuf>) -> Self {
        let root: PathBuf = dir.into();
        let cookies_file = root.join("cookies.txt");
        Self {
            download_dir: root.join("downloads"),
            ytdl_bin: YTDL_BIN.clone(),
            max_inline_size: download::DEFAULT_MAX_INLINE_SIZE,
            retention: Duration::from_secs(30 * 60),
            sweep_interval: Duration::from_secs(5 * 60),
            extraction_timeout: download::ytdlp_timeout(),
            lock_path: root.join("mediarelay.lock"),
            credentials: CredentialPaths {
                youtube_cookies_file: cookies_file.clone(),
                cookies_file,
                youtube_oauth_token: root.join("youtube_oauth_token.json"),
            },
            gofile_api_url: "https://api.gofile.io".to_string(),
            instagram_base_url: instagram::DEFAULT_BASE_URL.to_string(),
        }
    }
}

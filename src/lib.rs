//! mediarelay - Telegram bot that fetches media from YouTube, Instagram,
//! Facebook and TikTok through yt-dlp
//!
//! # Module Structure
//!
//! - `core`: configuration, errors, logging, instance lock, process helpers
//! - `download`: URL matching, per-platform extraction, cleanup and upload
//! - `telegram`: bot setup and the dispatcher handler tree
//! - `context`: the shared application context
//! - `oauth`: device-code helper for the YouTube token file
//! - `cli`: command line interface

pub mod cli;
pub mod context;
pub mod core;
pub mod download;
pub mod oauth;
pub mod telegram;

// Re-export commonly used types for convenience
pub use context::AppContext;
pub use core::{config, AppError, AppResult};
pub use download::{DownloadError, DownloadRequest, DownloadResult, Platform};

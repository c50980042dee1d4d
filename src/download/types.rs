//! Request and result types shared by the download pipeline.

use std::path::{Path, PathBuf};

use strum::{Display, EnumIter};
use url::Url;
use uuid::Uuid;

use crate::core::config;

/// What the user asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MediaFormat {
    Audio,
    Video,
    /// Let the platform policy decide (video for video platforms).
    #[default]
    Default,
}

/// Video height offered in the quality keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum VideoQuality {
    #[strum(to_string = "360p")]
    P360,
    #[strum(to_string = "480p")]
    P480,
    #[strum(to_string = "720p")]
    P720,
    #[strum(to_string = "1080p")]
    P1080,
}

impl VideoQuality {
    pub fn height(self) -> u32 {
        match self {
            VideoQuality::P360 => 360,
            VideoQuality::P480 => 480,
            VideoQuality::P720 => 720,
            VideoQuality::P1080 => 1080,
        }
    }

    pub fn from_height(height: u32) -> Option<Self> {
        match height {
            360 => Some(VideoQuality::P360),
            480 => Some(VideoQuality::P480),
            720 => Some(VideoQuality::P720),
            1080 => Some(VideoQuality::P1080),
            _ => None,
        }
    }

    /// Accepts `720` or `720p`.
    pub fn parse(s: &str) -> Option<Self> {
        s.trim().trim_end_matches('p').parse().ok().and_then(Self::from_height)
    }
}

/// A single download asked for by a user.
///
/// `id` prefixes every file the extractor writes for this request, so the
/// request owns exactly the files whose name starts with [`file_prefix`](Self::file_prefix).
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub id: Uuid,
    pub url: Url,
    pub format: MediaFormat,
    pub quality: Option<VideoQuality>,
}

impl DownloadRequest {
    pub fn new(url: Url, format: MediaFormat, quality: Option<VideoQuality>) -> Self {
        Self {
            id: Uuid::new_v4(),
            url,
            format,
            quality,
        }
    }

    pub fn audio(url: Url) -> Self {
        Self::new(url, MediaFormat::Audio, None)
    }

    pub fn video(url: Url, quality: VideoQuality) -> Self {
        Self::new(url, MediaFormat::Video, Some(quality))
    }

    pub fn file_prefix(&self) -> String {
        self.id.simple().to_string()
    }

    /// Requested height, or the default when none was chosen.
    pub fn target_height(&self) -> u32 {
        self.quality
            .map(VideoQuality::height)
            .unwrap_or(config::download::DEFAULT_VIDEO_HEIGHT)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Audio,
    Video,
    Photo,
}

impl MediaKind {
    /// Classifies by file extension; unknown extensions are treated as video.
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "mp3" | "m4a" | "aac" | "opus" | "ogg" | "wav" | "flac" => MediaKind::Audio,
            "jpg" | "jpeg" | "png" | "webp" | "heic" => MediaKind::Photo,
            _ => MediaKind::Video,
        }
    }
}

/// A finished download sitting in the download directory.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadResult {
    pub local_path: PathBuf,
    pub size_bytes: u64,
    pub title: Option<String>,
    /// Duration in seconds, for audio/video
    pub duration: Option<u32>,
    pub media_kind: MediaKind,
}

impl DownloadResult {
    pub fn file_name(&self) -> String {
        self.local_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string())
    }
}

//! Per-platform download policy: format selection, cookie policy and the
//! persona fallback ladder.

use std::path::Path;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use url::Url;

use crate::core::config;
use crate::download::credentials::{CookiePolicy, Credential, CredentialPaths};
use crate::download::error::DownloadError;
use crate::download::instagram_photo::PhotoFetcher;
use crate::download::normalize;
use crate::download::persona::Persona;
use crate::download::platform::Platform;
use crate::download::progress::ProgressEvent;
use crate::download::types::{DownloadRequest, DownloadResult, MediaFormat, MediaKind};
use crate::download::ytdlp::{ExtractionFailure, ExtractionJob, Extractor};
use crate::download::ytdlp_errors::YtDlpErrorType;

/// What an adapter needs from the outside world for one request.
pub struct ExtractionEnv<'a> {
    pub extractor: &'a dyn Extractor,
    pub credentials: &'a CredentialPaths,
    pub output_dir: &'a Path,
    /// Image-only Instagram posts; `None` disables the fallback
    pub photos: Option<&'a PhotoFetcher>,
}

#[derive(Debug, Clone)]
pub struct PlatformAdapter {
    pub platform: Platform,
    pub personas: &'static [Persona],
    pub cookie_policy: CookiePolicy,
}

impl PlatformAdapter {
    pub fn for_platform(platform: Platform) -> Self {
        Self {
            platform,
            personas: platform.personas(),
            cookie_policy: platform.cookie_policy(),
        }
    }

    /// yt-dlp format selection and post-processing for `request`.
    pub fn format_args(&self, request: &DownloadRequest) -> Vec<String> {
        if request.format == MediaFormat::Audio {
            return audio_args(self.platform);
        }

        let height = request.target_height();
        match self.platform {
            Platform::YouTube => vec![
                "-f".to_string(),
                format!(
                    "bestvideo*[height<={h}]+bestaudio*/bestvideo[height<={h}]+bestaudio/best*[height<={h}]/best[height<={h}]/best*/best",
                    h = height
                ),
                "--merge-output-format".to_string(),
                "mp4".to_string(),
            ],
            Platform::Facebook => vec![
                "-f".to_string(),
                format!("best[height<={h}]/bestvideo[height<={h}]+bestaudio/best", h = height),
                "--merge-output-format".to_string(),
                "mp4".to_string(),
            ],
            // photos and single-file posts: take whatever is best
            Platform::Instagram | Platform::TikTok => vec!["-f".to_string(), "best".to_string()],
        }
    }

    /// The credential attached to every attempt, or an early refusal.
    pub fn select_credential(&self, credentials: &CredentialPaths) -> Result<Option<Credential>, DownloadError> {
        match self.cookie_policy {
            CookiePolicy::None => Ok(None),
            CookiePolicy::Optional => Ok(credentials.for_platform(self.platform)),
            CookiePolicy::Required => match credentials.for_platform(self.platform) {
                Some(credential) => Ok(Some(credential)),
                None => Err(DownloadError::AuthRequired {
                    platform: self.platform,
                    reason: format!(
                        "no usable cookies at {}",
                        credentials.cookies_file.display()
                    ),
                }),
            },
        }
    }

    /// Runs the persona ladder until one attempt yields a file.
    ///
    /// The ladder only advances on failures another persona might get past;
    /// login walls, unavailable content and a missing tool end it at once.
    pub async fn download(
        &self,
        request: &DownloadRequest,
        url: &Url,
        env: &ExtractionEnv<'_>,
        progress_tx: &mpsc::UnboundedSender<ProgressEvent>,
    ) -> Result<DownloadResult, DownloadError> {
        let credential = self.select_credential(env.credentials)?;
        let url = normalize::clean_url(self.platform, url);
        let format_args = self.format_args(request);
        let total = self.personas.len();

        let mut last_failure: Option<ExtractionFailure> = None;
        let mut last_elapsed = Duration::ZERO;

        for (i, persona) in self.personas.iter().enumerate() {
            let _ = progress_tx.send(ProgressEvent::Attempt {
                persona: persona.name,
                index: i + 1,
                total,
            });

            let job = ExtractionJob {
                url: url.clone(),
                output_dir: env.output_dir.to_path_buf(),
                output_prefix: request.file_prefix(),
                format_args: format_args.clone(),
                persona: persona.clone(),
                credential: credential.clone(),
            };

            let started = Instant::now();
            match env.extractor.extract(&job, progress_tx.clone()).await {
                Ok(file) => {
                    let size_bytes = tokio::fs::metadata(&file.path)
                        .await
                        .map_err(|_| DownloadError::FileNotFound(file.path.display().to_string()))?
                        .len();
                    log::info!(
                        "✅ {} download succeeded with persona {} ({}/{})",
                        self.platform,
                        persona.name,
                        i + 1,
                        total
                    );
                    return Ok(DownloadResult {
                        media_kind: MediaKind::from_path(&file.path),
                        local_path: file.path,
                        size_bytes,
                        title: file.title,
                        duration: file.duration,
                    });
                }
                Err(failure) => {
                    log::warn!(
                        "❌ {} persona {} ({}/{}) failed: {}",
                        self.platform,
                        persona.name,
                        i + 1,
                        total,
                        failure.kind.as_str()
                    );
                    if !failure.kind.advances_ladder() {
                        return Err(self.terminal_error(failure, i + 1));
                    }
                    last_elapsed = started.elapsed();
                    last_failure = Some(failure);
                }
            }
        }

        let failure = last_failure.unwrap_or_else(|| ExtractionFailure::new(YtDlpErrorType::Unknown, "no personas"));
        if failure.kind == YtDlpErrorType::NoUsableStreams {
            if let Some(photo) = self.photo_fallback(request, &url, credential.as_ref(), env).await {
                return Ok(photo);
            }
        }
        Err(self.exhausted_error(failure, total, last_elapsed))
    }

    /// Image-only Instagram posts: yt-dlp finds no video, the post page has the picture.
    async fn photo_fallback(
        &self,
        request: &DownloadRequest,
        url: &Url,
        credential: Option<&Credential>,
        env: &ExtractionEnv<'_>,
    ) -> Option<DownloadResult> {
        let (Platform::Instagram, Some(fetcher), Some(Credential::CookieFile(cookies))) =
            (self.platform, env.photos, credential)
        else {
            return None;
        };

        log::info!("📸 No video in {}, trying the photo post path", url);
        match fetcher.fetch(url, cookies, env.output_dir, &request.file_prefix()).await {
            Ok(path) => {
                let size_bytes = tokio::fs::metadata(&path).await.ok()?.len();
                Some(DownloadResult {
                    local_path: path,
                    size_bytes,
                    title: None,
                    duration: None,
                    media_kind: MediaKind::Photo,
                })
            }
            Err(e) => {
                log::warn!("📸 Photo fallback failed for {}: {}", url, e);
                None
            }
        }
    }

    fn terminal_error(&self, failure: ExtractionFailure, attempts: usize) -> DownloadError {
        match failure.kind {
            YtDlpErrorType::LoginRequired => DownloadError::AuthRequired {
                platform: self.platform,
                reason: crate::core::utils::tail_lines(&failure.detail, 3),
            },
            kind => DownloadError::Extraction {
                platform: self.platform,
                kind,
                attempts,
                detail: failure.detail,
            },
        }
    }

    fn exhausted_error(&self, failure: ExtractionFailure, attempts: usize, last_elapsed: Duration) -> DownloadError {
        match failure.kind {
            YtDlpErrorType::NetworkError => DownloadError::Network(failure.detail),
            YtDlpErrorType::Timeout => DownloadError::Timeout(last_elapsed.as_secs()),
            kind => DownloadError::Extraction {
                platform: self.platform,
                kind,
                attempts,
                detail: failure.detail,
            },
        }
    }
}

fn audio_args(platform: Platform) -> Vec<String> {
    let selector = match platform {
        Platform::YouTube => "bestaudio/bestaudio*/best/best*",
        _ => "bestaudio/best",
    };
    vec![
        "-f".to_string(),
        selector.to_string(),
        "-x".to_string(),
        "--audio-format".to_string(),
        "mp3".to_string(),
        "--audio-quality".to_string(),
        config::download::AUDIO_QUALITY.to_string(),
    ]
}

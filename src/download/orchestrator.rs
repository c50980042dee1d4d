//! Entry point of the download pipeline: URL → platform → adapter → file.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use url::Url;

use crate::download::adapter::{ExtractionEnv, PlatformAdapter};
use crate::download::credentials::CredentialPaths;
use crate::download::error::DownloadError;
use crate::download::instagram_photo::PhotoFetcher;
use crate::download::normalize;
use crate::download::platform::{Platform, PlatformMatcher};
use crate::download::progress::ProgressEvent;
use crate::download::types::{DownloadRequest, DownloadResult};
use crate::download::ytdlp::Extractor;
use crate::download::ytdlp_errors::get_fix_recommendations;

pub struct Orchestrator {
    matcher: PlatformMatcher,
    extractor: Arc<dyn Extractor>,
    credentials: CredentialPaths,
    download_dir: PathBuf,
    http: reqwest::Client,
    photos: Option<PhotoFetcher>,
}

impl Orchestrator {
    pub fn new(
        matcher: PlatformMatcher,
        extractor: Arc<dyn Extractor>,
        credentials: CredentialPaths,
        download_dir: PathBuf,
        http: reqwest::Client,
    ) -> Self {
        Self {
            matcher,
            extractor,
            credentials,
            download_dir,
            http,
            photos: None,
        }
    }

    /// Enables the Instagram photo-post fallback.
    pub fn with_photo_fetcher(mut self, fetcher: PhotoFetcher) -> Self {
        self.photos = Some(fetcher);
        self
    }

    pub fn resolve(&self, url: &Url) -> Option<Platform> {
        self.matcher.resolve(url)
    }

    pub fn download_dir(&self) -> &PathBuf {
        &self.download_dir
    }

    /// Runs one request to completion. No retries beyond the persona ladder.
    pub async fn run(
        &self,
        request: &DownloadRequest,
        progress_tx: mpsc::UnboundedSender<ProgressEvent>,
    ) -> Result<DownloadResult, DownloadError> {
        let platform = self
            .resolve(&request.url)
            .ok_or_else(|| DownloadError::UnsupportedPlatform(request.url.to_string()))?;

        log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        log::info!("📥 {} request {} for {}", platform, request.id, request.url);

        let url = if platform == Platform::Facebook && normalize::is_share_link(&request.url) {
            normalize::expand_short_link(&self.http, &request.url).await
        } else {
            request.url.clone()
        };

        let env = ExtractionEnv {
            extractor: self.extractor.as_ref(),
            credentials: &self.credentials,
            output_dir: &self.download_dir,
            photos: self.photos.as_ref(),
        };
        let started = Instant::now();
        let result = PlatformAdapter::for_platform(platform)
            .download(request, &url, &env, &progress_tx)
            .await;
        let elapsed = started.elapsed();

        match &result {
            Ok(done) => log::info!(
                "✅ Request {} finished in {:.1}s: {} ({} bytes)",
                request.id,
                elapsed.as_secs_f64(),
                done.local_path.display(),
                done.size_bytes
            ),
            Err(e) => {
                log::error!(
                    "❌ Request {} failed after {:.1}s [{}]: {}",
                    request.id,
                    elapsed.as_secs_f64(),
                    e.category(),
                    e
                );
                if let DownloadError::Extraction { kind, .. } = e {
                    log::warn!("{}", get_fix_recommendations(*kind));
                }
            }
        }
        log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        result
    }
}

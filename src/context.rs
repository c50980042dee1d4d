//! Application context shared by the bot front-end and the CLI.

use std::sync::Arc;

use tokio::sync::mpsc;
use url::Url;

use crate::core::config::{self, Settings};
use crate::core::error::AppResult;
use crate::core::process;
use crate::download::cleanup::{FileLease, LeaseRegistry, Sweeper};
use crate::download::error::DownloadError;
use crate::download::instagram_photo::PhotoFetcher;
use crate::download::orchestrator::Orchestrator;
use crate::download::platform::{Platform, PlatformMatcher};
use crate::download::progress::ProgressEvent;
use crate::download::types::{DownloadRequest, DownloadResult};
use crate::download::upload::{self, Delivery, FileHost, GofileHost};
use crate::download::ytdlp::{Extractor, YtDlpExtractor};

/// Everything a request handler needs, built once at startup.
pub struct AppContext {
    pub settings: Settings,
    orchestrator: Orchestrator,
    leases: LeaseRegistry,
    file_host: Arc<dyn FileHost>,
}

impl AppContext {
    /// Production wiring: yt-dlp on disk and gofile.io.
    pub fn new(settings: Settings) -> AppResult<Self> {
        let mut extractor = YtDlpExtractor::new(settings.ytdl_bin.clone(), settings.extraction_timeout);
        if let Some(runtime) = process::detect_js_runtime() {
            log::info!("JS runtime for yt-dlp: {} ({})", runtime.name, runtime.path.display());
            extractor = extractor.with_js_runtime(runtime.name);
        }

        let http = http_client()?;
        let file_host = GofileHost::new(http, settings.gofile_api_url.clone());
        Self::with_parts(settings, Arc::new(extractor), Arc::new(file_host))
    }

    /// Wiring with an injected extractor and file host.
    pub fn with_parts(
        settings: Settings,
        extractor: Arc<dyn Extractor>,
        file_host: Arc<dyn FileHost>,
    ) -> AppResult<Self> {
        let http = http_client()?;
        let photos = PhotoFetcher::new(http.clone(), settings.instagram_base_url.clone());
        let orchestrator = Orchestrator::new(
            PlatformMatcher::default(),
            extractor,
            settings.credentials.clone(),
            settings.download_dir.clone(),
            http,
        )
        .with_photo_fetcher(photos);
        Ok(Self {
            settings,
            orchestrator,
            leases: LeaseRegistry::new(),
            file_host,
        })
    }

    pub fn resolve(&self, url: &Url) -> Option<Platform> {
        self.orchestrator.resolve(url)
    }

    /// Runs `request` with its files leased until the returned lease drops.
    pub async fn download(
        &self,
        request: &DownloadRequest,
        progress_tx: mpsc::UnboundedSender<ProgressEvent>,
    ) -> Result<(DownloadResult, FileLease), DownloadError> {
        let lease = self.leases.acquire(request.file_prefix());
        let result = self.orchestrator.run(request, progress_tx).await?;
        Ok((result, lease))
    }

    pub async fn deliver(&self, result: &DownloadResult) -> Result<Delivery, DownloadError> {
        upload::deliver(result, self.settings.max_inline_size, self.file_host.as_ref()).await
    }

    pub fn leases(&self) -> &LeaseRegistry {
        &self.leases
    }

    pub fn sweeper(&self) -> Sweeper {
        Sweeper::new(
            self.settings.download_dir.clone(),
            self.settings.retention,
            self.leases.clone(),
        )
    }
}

fn http_client() -> AppResult<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(config::network::timeout())
        .build()?)
}

//! Common test utilities
//!
//! A scripted extractor standing in for yt-dlp and a recording file host,
//! shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::mpsc;

use mediarelay::context::AppContext;
use mediarelay::core::Settings;
use mediarelay::download::progress::ProgressEvent;
use mediarelay::download::upload::FileHost;
use mediarelay::download::ytdlp::{ExtractedFile, ExtractionFailure, ExtractionJob, Extractor};
use mediarelay::download::ytdlp_errors::YtDlpErrorType;
use mediarelay::DownloadError;

/// What one scripted attempt does.
#[derive(Debug, Clone)]
pub enum Step {
    /// Writes `<prefix>_media.<ext>` of `size` bytes
    File { ext: &'static str, size: usize },
    Fail(YtDlpErrorType),
}

/// One recorded extractor call.
#[derive(Debug, Clone)]
pub struct Call {
    pub persona: &'static str,
    pub credential: Option<&'static str>,
    pub args: Vec<String>,
}

/// Replays `Step`s in order and records every call.
#[derive(Default)]
pub struct ScriptedExtractor {
    steps: Mutex<VecDeque<Step>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedExtractor {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Extractor for ScriptedExtractor {
    async fn extract(
        &self,
        job: &ExtractionJob,
        progress_tx: mpsc::UnboundedSender<ProgressEvent>,
    ) -> Result<ExtractedFile, ExtractionFailure> {
        self.calls.lock().unwrap().push(Call {
            persona: job.persona.name,
            credential: job.credential.as_ref().map(|c| c.kind()),
            args: job.format_args.clone(),
        });

        let step = self
            .steps
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Step::Fail(YtDlpErrorType::Unknown));
        match step {
            Step::File { ext, size } => {
                let path = job.output_dir.join(format!("{}_media.{}", job.output_prefix, ext));
                std::fs::write(&path, vec![0u8; size]).unwrap();
                let _ = progress_tx.send(ProgressEvent::Processing);
                Ok(ExtractedFile {
                    path,
                    title: Some("media".to_string()),
                    duration: Some(10),
                })
            }
            Step::Fail(kind) => Err(ExtractionFailure::new(kind, format!("scripted {}", kind.as_str()))),
        }
    }
}

/// Counts uploads and hands out a fixed link.
#[derive(Default)]
pub struct RecordingHost {
    pub uploads: AtomicUsize,
}

impl RecordingHost {
    pub fn count(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FileHost for RecordingHost {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn upload(&self, path: &Path) -> Result<String, DownloadError> {
        assert!(path.is_file(), "uploaded file must still exist");
        self.uploads.fetch_add(1, Ordering::SeqCst);
        Ok("https://files.example/d/abc".to_string())
    }

    fn caveat(&self) -> &'static str {
        "Links expire."
    }
}

/// A context rooted in a fresh temp dir.
pub struct TestEnvironment {
    pub dir: TempDir,
    pub ctx: AppContext,
    pub extractor: Arc<ScriptedExtractor>,
    pub host: Arc<RecordingHost>,
}

impl TestEnvironment {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self::with_settings(steps, |_| {})
    }

    pub fn with_settings(steps: impl IntoIterator<Item = Step>, tweak: impl FnOnce(&mut Settings)) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::rooted_at(dir.path());
        tweak(&mut settings);
        std::fs::create_dir_all(&settings.download_dir).unwrap();

        let extractor = ScriptedExtractor::new(steps);
        let host = Arc::new(RecordingHost::default());
        let ctx = AppContext::with_parts(settings, extractor.clone(), host.clone()).unwrap();
        Self {
            dir,
            ctx,
            extractor,
            host,
        }
    }

    /// Writes a cookie jar big enough to count as usable.
    pub fn install_cookies(&self) {
        std::fs::write(
            &self.ctx.settings.credentials.cookies_file,
            "# Netscape HTTP Cookie File\n.instagram.com\tTRUE\t/\tTRUE\t1999999999\tsessionid\tabc\n",
        )
        .unwrap();
    }

    pub fn download_dir_files(&self) -> Vec<String> {
        std::fs::read_dir(&self.ctx.settings.download_dir)
            .unwrap()
            .filter_map(Result::ok)
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect()
    }
}

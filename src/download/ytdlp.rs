//! yt-dlp invocation.
//!
//! One call to [`Extractor::extract`] is one persona attempt: a single yt-dlp
//! process writing into the download directory under the request's prefix.
//! The persona ladder lives in the adapter; this module never retries.

use std::collections::VecDeque;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::mpsc;
use url::Url;

use crate::download::credentials::Credential;
use crate::download::persona::Persona;
use crate::download::progress::{is_postprocess_line, parse_progress, ProgressEvent};
use crate::download::ytdlp_errors::{analyze_ytdlp_error, YtDlpErrorType};

const FILE_MARKER: &str = "__FILE__";
const META_MARKER: &str = "__META__";
const STDERR_TAIL_LINES: usize = 200;

/// Everything one attempt needs.
#[derive(Debug, Clone)]
pub struct ExtractionJob {
    pub url: Url,
    pub output_dir: PathBuf,
    /// Every file of the attempt starts with this prefix
    pub output_prefix: String,
    /// Format selection and post-processing flags
    pub format_args: Vec<String>,
    pub persona: Persona,
    pub credential: Option<Credential>,
}

/// The file an attempt produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedFile {
    pub path: PathBuf,
    pub title: Option<String>,
    pub duration: Option<u32>,
}

/// Why an attempt failed.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionFailure {
    pub kind: YtDlpErrorType,
    pub detail: String,
}

impl ExtractionFailure {
    pub fn new(kind: YtDlpErrorType, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

/// Seam between the persona ladder and the external tool.
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(
        &self,
        job: &ExtractionJob,
        progress_tx: mpsc::UnboundedSender<ProgressEvent>,
    ) -> Result<ExtractedFile, ExtractionFailure>;
}

/// Runs the yt-dlp binary.
#[derive(Debug, Clone)]
pub struct YtDlpExtractor {
    bin: String,
    timeout: Duration,
    js_runtime: Option<String>,
}

impl YtDlpExtractor {
    pub fn new(bin: impl Into<String>, timeout: Duration) -> Self {
        Self {
            bin: bin.into(),
            timeout,
            js_runtime: None,
        }
    }

    /// Passes `--js-runtimes <name>` on every call.
    pub fn with_js_runtime(mut self, runtime: impl Into<String>) -> Self {
        self.js_runtime = Some(runtime.into());
        self
    }

    /// Full argument list for one attempt. `secret_config` is the private
    /// config file holding credentials that must stay off the command line.
    pub fn build_args(&self, job: &ExtractionJob, secret_config: Option<&Path>) -> Vec<String> {
        let template = job
            .output_dir
            .join(format!("{}_%(title).50s-%(id)s.%(ext)s", job.output_prefix));

        let mut args = vec![
            "-o".to_string(),
            template.to_string_lossy().into_owned(),
            "--newline".to_string(),
            "--no-playlist".to_string(),
            "--restrict-filenames".to_string(),
            "--force-overwrites".to_string(),
            "--no-part".to_string(),
            "--socket-timeout".to_string(),
            "30".to_string(),
            "--print".to_string(),
            format!("after_move:{}%(filepath)s", FILE_MARKER),
            "--print".to_string(),
            format!("after_move:{}%(duration)s|%(title)s", META_MARKER),
            "--progress".to_string(),
        ];

        if let Some(runtime) = &self.js_runtime {
            args.push("--js-runtimes".to_string());
            args.push(runtime.clone());
        }
        args.extend(job.persona.to_args());
        if let Some(credential) = &job.credential {
            args.extend(credential.to_args());
        }
        if let Some(config) = secret_config {
            args.push("--config-locations".to_string());
            args.push(config.to_string_lossy().into_owned());
        }
        args.extend(job.format_args.iter().cloned());
        args.push("--".to_string());
        args.push(job.url.to_string());
        args
    }
}

#[async_trait]
impl Extractor for YtDlpExtractor {
    async fn extract(
        &self,
        job: &ExtractionJob,
        progress_tx: mpsc::UnboundedSender<ProgressEvent>,
    ) -> Result<ExtractedFile, ExtractionFailure> {
        let secret_config = match job.credential.as_ref().and_then(|c| c.config_file_body()) {
            Some(body) => Some(SecretConfig::write(&job.output_prefix, &body)?),
            None => None,
        };

        let bin = self.bin.clone();
        let args = self.build_args(job, secret_config.as_ref().map(SecretConfig::path));
        let timeout = self.timeout;
        let output_dir = job.output_dir.clone();
        let prefix = job.output_prefix.clone();

        log::info!(
            "▶️  yt-dlp attempt: persona={} credential={} url={}",
            job.persona.name,
            job.credential.as_ref().map(Credential::kind).unwrap_or("none"),
            job.url
        );

        let handle = tokio::task::spawn_blocking(move || {
            let run = run_ytdlp_with_progress(&bin, &args, timeout, &progress_tx)?;
            locate_output(&output_dir, &prefix, run)
        });

        let outcome = handle
            .await
            .map_err(|e| ExtractionFailure::new(YtDlpErrorType::Unknown, format!("Task join error: {}", e)))?;
        drop(secret_config);
        outcome
    }
}

/// Owner-only yt-dlp config file, removed when dropped.
#[derive(Debug)]
struct SecretConfig {
    path: PathBuf,
}

impl SecretConfig {
    fn write(prefix: &str, body: &SecretString) -> Result<Self, ExtractionFailure> {
        use std::io::Write;

        let path = std::env::temp_dir().join(format!("mediarelay-{}.conf", prefix));
        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let config = Self { path };
        options
            .open(&config.path)
            .and_then(|mut file| file.write_all(body.expose_secret().as_bytes()))
            .map_err(|e| {
                ExtractionFailure::new(
                    YtDlpErrorType::Unknown,
                    format!("cannot write credential config {}: {}", config.path.display(), e),
                )
            })?;
        Ok(config)
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SecretConfig {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// What yt-dlp printed on a successful run.
#[derive(Debug, Default)]
struct RunOutput {
    file: Option<PathBuf>,
    title: Option<String>,
    duration: Option<u32>,
}

/// Run yt-dlp with stdout/stderr capture and progress reporting.
fn run_ytdlp_with_progress(
    ytdl_bin: &str,
    args: &[String],
    timeout: Duration,
    progress_tx: &mpsc::UnboundedSender<ProgressEvent>,
) -> Result<RunOutput, ExtractionFailure> {
    let mut child = Command::new(ytdl_bin)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            log::error!("Failed to spawn {}: {}", ytdl_bin, e);
            ExtractionFailure::new(YtDlpErrorType::ToolUnavailable, format!("Failed to spawn {}: {}", ytdl_bin, e))
        })?;

    let stderr_lines = Arc::new(Mutex::new(VecDeque::<String>::new()));
    let output = Arc::new(Mutex::new(RunOutput::default()));

    let mut readers = Vec::new();

    if let Some(stderr_stream) = child.stderr.take() {
        let tx = progress_tx.clone();
        let stderr_lines = Arc::clone(&stderr_lines);
        readers.push(std::thread::spawn(move || {
            for line in BufReader::new(stderr_stream).lines().map_while(Result::ok) {
                log::debug!("yt-dlp stderr: {}", line);
                forward_progress(&line, &tx);
                if let Ok(mut lines) = stderr_lines.lock() {
                    lines.push_back(line);
                    if lines.len() > STDERR_TAIL_LINES {
                        lines.pop_front();
                    }
                }
            }
        }));
    }

    if let Some(stdout_stream) = child.stdout.take() {
        let tx = progress_tx.clone();
        let output = Arc::clone(&output);
        readers.push(std::thread::spawn(move || {
            for line in BufReader::new(stdout_stream).lines().map_while(Result::ok) {
                log::debug!("yt-dlp stdout: {}", line);
                if let Ok(mut out) = output.lock() {
                    if absorb_marker(&line, &mut out) {
                        continue;
                    }
                }
                forward_progress(&line, &tx);
            }
        }));
    }

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if Instant::now() >= deadline {
                    log::error!("yt-dlp process timed out after {}s, killing", timeout.as_secs());
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(ExtractionFailure::new(
                        YtDlpErrorType::Timeout,
                        format!("yt-dlp timed out after {}s", timeout.as_secs()),
                    ));
                }
                std::thread::sleep(Duration::from_millis(200));
            }
            Err(e) => {
                return Err(ExtractionFailure::new(
                    YtDlpErrorType::Unknown,
                    format!("downloader process failed: {}", e),
                ))
            }
        }
    };

    for reader in readers {
        let _ = reader.join();
    }

    if status.success() {
        let out = output.lock().map(|mut o| std::mem::take(&mut *o)).unwrap_or_default();
        return Ok(out);
    }

    let stderr_text = stderr_lines
        .lock()
        .map(|mut lines| lines.make_contiguous().join("\n"))
        .unwrap_or_default();
    let kind = analyze_ytdlp_error(&stderr_text);
    log::warn!("yt-dlp exited with {} ({})", status, kind.as_str());
    Err(ExtractionFailure::new(kind, stderr_text))
}

fn forward_progress(line: &str, tx: &mpsc::UnboundedSender<ProgressEvent>) {
    if let Some(info) = parse_progress(line) {
        let _ = tx.send(ProgressEvent::Downloading(info));
    } else if is_postprocess_line(line) {
        let _ = tx.send(ProgressEvent::Processing);
    }
}

/// Records `--print` marker lines. Returns true when the line was a marker.
fn absorb_marker(line: &str, out: &mut RunOutput) -> bool {
    if let Some(path) = line.strip_prefix(FILE_MARKER) {
        // Multi-item posts print one path per item; the first one is delivered
        if out.file.is_none() {
            out.file = Some(PathBuf::from(path.trim()));
        }
        return true;
    }
    if let Some(meta) = line.strip_prefix(META_MARKER) {
        let (duration, title) = meta.split_once('|').unwrap_or((meta, ""));
        out.duration = duration.trim().parse::<f64>().ok().map(|d| d.round() as u32);
        out.title = Some(title.trim())
            .filter(|t| !t.is_empty() && *t != "NA")
            .map(str::to_string);
        return true;
    }
    false
}

/// Picks the result file for a finished run and removes stray siblings.
///
/// Prefers the first path yt-dlp printed; otherwise the first finished media
/// file carrying the request prefix, in the order yt-dlp wrote them.
fn locate_output(dir: &Path, prefix: &str, run: RunOutput) -> Result<ExtractedFile, ExtractionFailure> {
    let candidates = prefixed_files(dir, prefix);

    let chosen = run
        .file
        .filter(|p| p.is_file())
        .or_else(|| {
            candidates
                .iter()
                .filter(|p| !is_partial(p) && !is_sidecar(p))
                .min_by_key(|p| (std::fs::metadata(p).and_then(|m| m.modified()).ok(), (*p).clone()))
                .cloned()
        })
        .ok_or_else(|| {
            ExtractionFailure::new(
                YtDlpErrorType::NoUsableStreams,
                format!("yt-dlp finished but no file with prefix {} exists in {}", prefix, dir.display()),
            )
        })?;

    // one request, one file
    for stray in candidates.iter().filter(|p| **p != chosen) {
        if let Err(e) = std::fs::remove_file(stray) {
            log::warn!("Failed to remove stray file {}: {}", stray.display(), e);
        }
    }

    Ok(ExtractedFile {
        path: chosen,
        title: run.title,
        duration: run.duration,
    })
}

fn prefixed_files(dir: &Path, prefix: &str) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    entries
        .filter_map(Result::ok)
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter(|e| e.file_name().to_string_lossy().starts_with(prefix))
        .map(|e| e.path())
        .collect()
}

/// Thumbnails, subtitles and metadata yt-dlp may leave next to the media.
fn is_sidecar(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("webp" | "vtt" | "srt" | "json" | "description")
    )
}

fn is_partial(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("part" | "ytdl" | "temp" | "tmp")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::persona;
    use tempfile::tempdir;

    fn job(dir: &Path) -> ExtractionJob {
        ExtractionJob {
            url: Url::parse("https://www.youtube.com/watch?v=abc").unwrap(),
            output_dir: dir.to_path_buf(),
            output_prefix: "req1".to_string(),
            format_args: vec!["-f".to_string(), "best".to_string()],
            persona: persona::YOUTUBE[0].clone(),
            credential: Some(Credential::CookieFile(PathBuf::from("/tmp/cookies.txt"))),
        }
    }

    #[test]
    fn test_build_args_layout() {
        let dir = tempdir().unwrap();
        let extractor = YtDlpExtractor::new("yt-dlp", Duration::from_secs(5)).with_js_runtime("node");
        let args = extractor.build_args(&job(dir.path()), None);

        assert_eq!(args[0], "-o");
        assert!(args[1].contains("req1_%(title).50s-%(id)s.%(ext)s"));
        assert!(args.windows(2).any(|w| w[0] == "--cookies" && w[1] == "/tmp/cookies.txt"));
        assert!(args.windows(2).any(|w| w[0] == "--extractor-args" && w[1] == "youtube:player_client=android"));
        assert!(args.windows(2).any(|w| w[0] == "--js-runtimes" && w[1] == "node"));
        assert_eq!(args[args.len() - 2], "--");
        assert_eq!(args[args.len() - 1], "https://www.youtube.com/watch?v=abc");
    }

    #[test]
    fn test_bearer_token_stays_off_command_line() {
        let dir = tempdir().unwrap();
        let mut oauth_job = job(dir.path());
        oauth_job.credential = Some(Credential::OAuthBearer(SecretString::from("ya29.secret-token")));
        let body = oauth_job.credential.as_ref().and_then(Credential::config_file_body).unwrap();

        let config = SecretConfig::write("req-oauth", &body).unwrap();
        let extractor = YtDlpExtractor::new("yt-dlp", Duration::from_secs(5));
        let args = extractor.build_args(&oauth_job, Some(config.path()));

        assert!(args.iter().all(|a| !a.contains("ya29.secret-token")));
        assert!(args.windows(2).any(|w| w[0] == "--config-locations" && Path::new(&w[1]) == config.path()));
        let written = std::fs::read_to_string(config.path()).unwrap();
        assert!(written.contains("Authorization:Bearer ya29.secret-token"));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(config.path()).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }

        let path = config.path().to_path_buf();
        drop(config);
        assert!(!path.exists());
    }

    #[test]
    fn test_absorb_marker() {
        let mut out = RunOutput::default();
        assert!(absorb_marker("__FILE__/d/req1_Song-abc.mp3", &mut out));
        assert!(absorb_marker("__META__212.4|Song Title", &mut out));
        assert!(!absorb_marker("[download] 10%", &mut out));
        assert_eq!(out.file, Some(PathBuf::from("/d/req1_Song-abc.mp3")));
        assert_eq!(out.duration, Some(212));
        assert_eq!(out.title.as_deref(), Some("Song Title"));

        let mut out = RunOutput::default();
        absorb_marker("__META__NA|NA", &mut out);
        assert_eq!(out.duration, None);
        assert_eq!(out.title, None);
    }

    #[test]
    fn test_locate_output_falls_back_to_prefix_and_removes_strays() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("req1_a-x.mp4"), vec![0u8; 64]).unwrap();
        std::fs::write(dir.path().join("req1_a-x.webp"), vec![0u8; 8]).unwrap();
        std::fs::write(dir.path().join("other_b-y.mp4"), vec![0u8; 8]).unwrap();

        let file = locate_output(dir.path(), "req1", RunOutput::default()).unwrap();
        assert_eq!(file.path, dir.path().join("req1_a-x.mp4"));
        assert!(!dir.path().join("req1_a-x.webp").exists());
        assert!(dir.path().join("other_b-y.mp4").exists());
    }

    #[test]
    fn test_locate_output_delivers_first_item() {
        let dir = tempdir().unwrap();
        let first = dir.path().join("req1_post-1.jpg");
        let second = dir.path().join("req1_post-2.mp4");
        std::fs::write(&first, vec![0u8; 8]).unwrap();
        std::thread::sleep(Duration::from_millis(20));
        std::fs::write(&second, vec![0u8; 512]).unwrap();

        let file = locate_output(dir.path(), "req1", RunOutput::default()).unwrap();
        assert_eq!(file.path, first);
        assert!(!second.exists());
    }

    #[test]
    fn test_first_printed_path_wins() {
        let dir = tempdir().unwrap();
        let first = dir.path().join("req1_post-1.mp4");
        let second = dir.path().join("req1_post-2.mp4");
        std::fs::write(&first, b"a").unwrap();
        std::fs::write(&second, b"bb").unwrap();

        let mut out = RunOutput::default();
        absorb_marker(&format!("__FILE__{}", first.display()), &mut out);
        absorb_marker(&format!("__FILE__{}", second.display()), &mut out);

        let file = locate_output(dir.path(), "req1", out).unwrap();
        assert_eq!(file.path, first);
        assert!(!second.exists());
    }

    #[test]
    fn test_locate_output_without_file() {
        let dir = tempdir().unwrap();
        let err = locate_output(dir.path(), "req1", RunOutput::default()).unwrap_err();
        assert_eq!(err.kind, YtDlpErrorType::NoUsableStreams);
    }

    #[tokio::test]
    async fn test_missing_binary_is_tool_unavailable() {
        let dir = tempdir().unwrap();
        let extractor = YtDlpExtractor::new("definitely-not-yt-dlp-4f1c", Duration::from_secs(5));
        let (tx, _rx) = mpsc::unbounded_channel();
        let err = extractor.extract(&job(dir.path()), tx).await.unwrap_err();
        assert_eq!(err.kind, YtDlpErrorType::ToolUnavailable);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_fake_ytdlp_script() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let out_dir = dir.path().join("out");
        std::fs::create_dir_all(&out_dir).unwrap();
        let script = dir.path().join("fake-yt-dlp");
        let target = out_dir.join("req1_Song-abc.mp3");
        std::fs::write(
            &script,
            format!(
                "#!/bin/sh\necho '[download]  50.0% of 1.00MiB at 1.00MiB/s ETA 00:01'\nprintf 'ID3' > '{0}'\necho '__FILE__{0}'\necho '__META__61|Song'\n",
                target.display()
            ),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let extractor = YtDlpExtractor::new(script.to_string_lossy(), Duration::from_secs(10));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let file = extractor.extract(&job(&out_dir), tx).await.unwrap();

        assert_eq!(file.path, target);
        assert_eq!(file.duration, Some(61));
        assert!(matches!(rx.recv().await, Some(ProgressEvent::Downloading(p)) if p.percent == 50));
    }
}

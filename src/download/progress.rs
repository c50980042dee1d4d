//! Progress side-channel between the extractor and whoever shows status to the user.

/// Parsed `[download]` line
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressInfo {
    pub percent: u8,
    pub speed_mbs: Option<f64>,
    pub eta_seconds: Option<u64>,
    pub current_size: Option<u64>,
    pub total_size: Option<u64>,
}

/// Events sent over the progress channel while a request runs.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// A persona attempt started (`index` is 1-based)
    Attempt {
        persona: &'static str,
        index: usize,
        total: usize,
    },
    Downloading(ProgressInfo),
    /// Post-processing (merge, audio extraction, remux)
    Processing,
}

/// Parses progress from yt-dlp output line
/// Example: "[download]  45.2% of 10.00MiB at 500.00KiB/s ETA 00:10"
pub fn parse_progress(line: &str) -> Option<ProgressInfo> {
    if !line.contains("[download]") || !line.contains('%') {
        return None;
    }

    let mut percent = None;
    let mut speed_mbs = None;
    let mut eta_seconds = None;
    let mut total_size = None;

    let parts: Vec<&str> = line.split_whitespace().collect();
    for (i, part) in parts.iter().enumerate() {
        let next = parts.get(i + 1);

        if percent.is_none() && part.ends_with('%') {
            if let Ok(p) = part.trim_end_matches('%').parse::<f32>() {
                // clamp so garbage never reads as "done"
                percent = Some(p.clamp(0.0, 100.0) as u8);
            }
        }

        match (*part, next) {
            // "of 10.00MiB" or "of ~ 10.00MiB"
            ("of", Some(&"~")) => total_size = parts.get(i + 2).and_then(|s| parse_size(s)),
            ("of", Some(size)) => total_size = parse_size(size.trim_start_matches('~')),
            ("at", Some(speed)) => speed_mbs = parse_size(speed).map(|b| b as f64 / (1024.0 * 1024.0)),
            ("ETA", Some(eta)) => eta_seconds = parse_eta(eta),
            _ => {}
        }
    }

    let percent = percent?;
    let current_size = total_size.map(|total| (total as f64 * (f64::from(percent) / 100.0)) as u64);

    Some(ProgressInfo {
        percent,
        speed_mbs,
        eta_seconds,
        current_size,
        total_size,
    })
}

/// Lines yt-dlp prints when a post-processor starts.
pub fn is_postprocess_line(line: &str) -> bool {
    ["[ExtractAudio]", "[Merger]", "[VideoConvertor]", "[VideoRemuxer]", "[FixupM3u8]"]
        .iter()
        .any(|tag| line.starts_with(tag))
}

/// Parses "10.00MiB", "500.00KiB", "1.2GiB" (optionally with "/s")
fn parse_size(size_str: &str) -> Option<u64> {
    let size_str = size_str.trim_end_matches("/s");
    let (number, multiplier) = if let Some(n) = size_str.strip_suffix("GiB") {
        (n, 1024.0 * 1024.0 * 1024.0)
    } else if let Some(n) = size_str.strip_suffix("MiB") {
        (n, 1024.0 * 1024.0)
    } else if let Some(n) = size_str.strip_suffix("KiB") {
        (n, 1024.0)
    } else if let Some(n) = size_str.strip_suffix('B') {
        (n, 1.0)
    } else {
        return None;
    };
    number.parse::<f64>().ok().map(|v| (v * multiplier) as u64)
}

/// Parses "00:10", "1:23" or "1:02:03"
fn parse_eta(eta_str: &str) -> Option<u64> {
    let parts = eta_str.split(':').map(|p| p.parse().ok()).collect::<Option<Vec<u64>>>()?;
    match parts.as_slice() {
        [m, s] => Some(m * 60 + s),
        [h, m, s] => Some(h * 3600 + m * 60 + s),
        _ => None,
    }
}

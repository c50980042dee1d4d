use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

#[allow(clippy::expect_used)]
static URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://\S+").expect("Failed to compile URL regex"));

/// Extracts every http(s) URL from free text, in order of appearance.
///
/// Trailing punctuation that usually belongs to the sentence (`.,;:!?)»`) is dropped.
///
/// ```
/// use mediarelay::core::utils::extract_urls;
///
/// let urls = extract_urls("look https://youtu.be/abc123, nice");
/// assert_eq!(urls[0].as_str(), "https://youtu.be/abc123");
/// ```
pub fn extract_urls(text: &str) -> Vec<Url> {
    URL_RE
        .find_iter(text)
        .map(|m| m.as_str().trim_end_matches(['.', ',', ';', ':', '!', '?', ')', '»', '"', '\'']))
        .filter_map(|candidate| Url::parse(candidate).ok())
        .collect()
}

/// First URL in the text, if any.
pub fn first_url(text: &str) -> Option<Url> {
    extract_urls(text).into_iter().next()
}

/// Human-readable size: `512 B`, `1.5 KB`, `12.3 MB`, `1.02 GB`.
pub fn format_bytes(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    let b = bytes as f64;
    if b >= GB {
        format!("{:.2} GB", b / GB)
    } else if b >= MB {
        format!("{:.1} MB", b / MB)
    } else if b >= KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{} B", bytes)
    }
}

/// `m:ss` or `h:mm:ss`.
pub fn format_duration(seconds: u64) -> String {
    let (h, m, s) = (seconds / 3600, (seconds % 3600) / 60, seconds % 60);
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{}:{:02}", m, s)
    }
}

/// Fixed-width bar: `█` for completed cells, `░` for the rest.
pub fn render_progress_bar(percent: u8, width: usize) -> String {
    let percent = usize::from(percent.min(100));
    let filled = percent * width / 100;
    let mut bar = String::with_capacity(width * 3);
    bar.extend(std::iter::repeat_n('█', filled));
    bar.extend(std::iter::repeat_n('░', width - filled));
    bar
}

/// Keeps the last `max_lines` lines of a (possibly long) tool output.
pub fn tail_lines(text: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(max_lines);
    lines[start..].join("\n")
}

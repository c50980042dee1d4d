//! Classification of yt-dlp failures.
//!
//! yt-dlp reports everything on stderr as free text; the persona ladder only
//! needs to know whether another client identity has a chance of succeeding.

/// yt-dlp failure kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YtDlpErrorType {
    /// Extractor found the post but no playable audio/video (only preview images)
    NoUsableStreams,
    /// Extractor could not parse the page (layout served to this client changed)
    ParseFailure,
    /// Platform challenged or throttled the client (bot check, 403, 429)
    BotDetection,
    /// Platform demands a signed-in session, or the configured one was rejected
    LoginRequired,
    /// Content is private, removed or geo-blocked
    Unavailable,
    /// Connection-level failure
    NetworkError,
    /// Process exceeded the extraction timeout
    Timeout,
    /// yt-dlp could not be started at all
    ToolUnavailable,
    /// Anything else
    Unknown,
}

/// Analyzes yt-dlp stderr and determines the error type
pub fn analyze_ytdlp_error(stderr: &str) -> YtDlpErrorType {
    let stderr_lower = stderr.to_lowercase();

    if contains_any(&stderr_lower, &["cannot parse data"]) {
        return YtDlpErrorType::ParseFailure;
    }

    if contains_any(&stderr_lower, &[
        "only images are available",
        "requested format is not available",
        "no video formats found",
        "no formats found",
        "there is no video in this post",
    ]) {
        return YtDlpErrorType::NoUsableStreams;
    }

    if contains_any(&stderr_lower, &[
        "sign in to confirm you're not a bot",
        "sign in to confirm you’re not a bot",
        "bot detection",
        "http error 403",
        "http error 429",
        "too many requests",
        "signature extraction failed",
    ]) {
        return YtDlpErrorType::BotDetection;
    }

    if contains_any(&stderr_lower, &[
        "login required",
        "cookies are no longer valid",
        "cookies have likely been rotated",
        "use --cookies",
        "please sign in",
        "you need to log in",
        "this content isn't available to everyone",
    ]) {
        return YtDlpErrorType::LoginRequired;
    }

    if contains_any(&stderr_lower, &[
        "private video",
        "video unavailable",
        "this video is not available",
        "video is private",
        "video has been removed",
        "this video does not exist",
        "video is not available",
        "http error 404",
        "post isn't available",
    ]) {
        return YtDlpErrorType::Unavailable;
    }

    if contains_any(&stderr_lower, &[
        "timeout",
        "timed out",
        "connection",
        "network",
        "socket",
        "dns",
        "failed to connect",
    ]) {
        return YtDlpErrorType::NetworkError;
    }

    YtDlpErrorType::Unknown
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

impl YtDlpErrorType {
    /// Whether the next persona in the ladder should be tried.
    pub fn advances_ladder(self) -> bool {
        !matches!(
            self,
            YtDlpErrorType::LoginRequired | YtDlpErrorType::Unavailable | YtDlpErrorType::ToolUnavailable
        )
    }

    /// Failures an operator can fix (credentials, binary, extractor updates).
    pub fn needs_operator(self) -> bool {
        matches!(
            self,
            YtDlpErrorType::LoginRequired
                | YtDlpErrorType::BotDetection
                | YtDlpErrorType::ToolUnavailable
                | YtDlpErrorType::ParseFailure
                | YtDlpErrorType::Unknown
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            YtDlpErrorType::NoUsableStreams => "no_usable_streams",
            YtDlpErrorType::ParseFailure => "parse_failure",
            YtDlpErrorType::BotDetection => "bot_detection",
            YtDlpErrorType::LoginRequired => "login_required",
            YtDlpErrorType::Unavailable => "unavailable",
            YtDlpErrorType::NetworkError => "network",
            YtDlpErrorType::Timeout => "timeout",
            YtDlpErrorType::ToolUnavailable => "tool_unavailable",
            YtDlpErrorType::Unknown => "unknown",
        }
    }
}

/// Returns fix recommendations for the logs
pub fn get_fix_recommendations(error_type: YtDlpErrorType) -> &'static str {
    match error_type {
        YtDlpErrorType::LoginRequired => {
            "🔧 Export fresh cookies (Netscape format) from a signed-in browser, \
             copy them to the configured cookie path and restart the bot"
        }
        YtDlpErrorType::BotDetection => {
            "🔧 The platform is challenging automated clients: refresh cookies, \
             update yt-dlp and make sure a JavaScript runtime (deno/node) is installed"
        }
        YtDlpErrorType::ParseFailure => "🔧 Extractor could not parse the page: update yt-dlp",
        YtDlpErrorType::ToolUnavailable => "🔧 Install yt-dlp or point YTDL_BIN at it",
        YtDlpErrorType::NetworkError | YtDlpErrorType::Timeout => {
            "🔧 Check outbound connectivity from the bot host"
        }
        YtDlpErrorType::NoUsableStreams | YtDlpErrorType::Unavailable => "ℹ️  Content-specific, no action needed",
        YtDlpErrorType::Unknown => "🔧 Check the yt-dlp output in the log file and update yt-dlp",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_usable_streams() {
        assert_eq!(
            analyze_ytdlp_error("ERROR: [youtube] abc: Requested format is not available. Use --list-formats"),
            YtDlpErrorType::NoUsableStreams
        );
        assert_eq!(
            analyze_ytdlp_error("WARNING: Only images are available for download"),
            YtDlpErrorType::NoUsableStreams
        );
    }

    #[test]
    fn test_bot_detection_before_login() {
        let stderr = "ERROR: [youtube] x: Sign in to confirm you're not a bot. Use --cookies-from-browser or --cookies";
        assert_eq!(analyze_ytdlp_error(stderr), YtDlpErrorType::BotDetection);
    }

    #[test]
    fn test_login_required() {
        let stderr = "ERROR: [Instagram] ABC: Requested content is not available, login required";
        assert_eq!(analyze_ytdlp_error(stderr), YtDlpErrorType::LoginRequired);
    }

    #[test]
    fn test_unavailable() {
        assert_eq!(
            analyze_ytdlp_error("ERROR: [youtube] x: Private video. Sign in if you've been granted access"),
            YtDlpErrorType::Unavailable
        );
    }

    #[test]
    fn test_parse_failure() {
        assert_eq!(
            analyze_ytdlp_error("ERROR: [facebook] 123: Cannot parse data; please report this issue"),
            YtDlpErrorType::ParseFailure
        );
    }

    #[test]
    fn test_network_and_unknown() {
        assert_eq!(
            analyze_ytdlp_error("ERROR: Unable to download webpage: <urlopen error [Errno -3] Temporary failure in name resolution> (caused by dns)"),
            YtDlpErrorType::NetworkError
        );
        assert_eq!(analyze_ytdlp_error("ERROR: something odd"), YtDlpErrorType::Unknown);
    }

    #[test]
    fn test_ladder_policy() {
        assert!(YtDlpErrorType::NoUsableStreams.advances_ladder());
        assert!(YtDlpErrorType::BotDetection.advances_ladder());
        assert!(YtDlpErrorType::NetworkError.advances_ladder());
        assert!(YtDlpErrorType::Timeout.advances_ladder());
        assert!(!YtDlpErrorType::LoginRequired.advances_ladder());
        assert!(!YtDlpErrorType::Unavailable.advances_ladder());
        assert!(!YtDlpErrorType::ToolUnavailable.advances_ladder());
    }
}

//! Supported platforms and the URL matcher.
//!
//! The set of platforms is closed: adding one means adding a variant here.
//! The matcher evaluates rules in registration order and the first match wins,
//! which is the tie-break for URLs that several rules would accept.

use once_cell::sync::Lazy;
use regex::Regex;
use strum::{Display, EnumIter, IntoEnumIterator};
use url::Url;

use crate::download::credentials::CookiePolicy;
use crate::download::persona::{self, Persona};

/// Platforms in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum Platform {
    YouTube,
    Instagram,
    Facebook,
    TikTok,
}

// Patterns are literals; `test_all_patterns_compile` forces every one of them.
#[allow(clippy::expect_used)]
fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("platform pattern must compile"))
        .collect()
}

// Patterns are matched against `host + path` of the parsed URL.
static YOUTUBE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"^(?:www\.|m\.|music\.)?youtube\.com/",
        r"^youtu\.be/",
    ])
});

static INSTAGRAM_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"^(?:www\.)?instagram\.com/(?:p|reel|reels|tv|stories)/",
        r"^(?:www\.)?instagr\.am/",
    ])
});

static FACEBOOK_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"^(?:www\.|m\.|web\.)?facebook\.com/",
        r"^fb\.watch/",
        r"^(?:www\.)?fb\.com/",
    ])
});

static TIKTOK_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| compile(&[r"^(?:www\.|vm\.|vt\.|m\.)?tiktok\.com/"]));

impl Platform {
    pub fn patterns(self) -> &'static [Regex] {
        match self {
            Platform::YouTube => &YOUTUBE_PATTERNS,
            Platform::Instagram => &INSTAGRAM_PATTERNS,
            Platform::Facebook => &FACEBOOK_PATTERNS,
            Platform::TikTok => &TIKTOK_PATTERNS,
        }
    }

    /// Client personas, tried in order.
    pub fn personas(self) -> &'static [Persona] {
        match self {
            Platform::YouTube => persona::YOUTUBE,
            Platform::Instagram => persona::INSTAGRAM,
            Platform::Facebook => persona::FACEBOOK,
            Platform::TikTok => persona::TIKTOK,
        }
    }

    pub fn cookie_policy(self) -> CookiePolicy {
        match self {
            Platform::YouTube => CookiePolicy::Optional,
            Platform::Instagram => CookiePolicy::Required,
            Platform::Facebook => CookiePolicy::Optional,
            Platform::TikTok => CookiePolicy::None,
        }
    }

    /// Session cookies a signed-in jar for this platform should contain.
    pub fn critical_cookies(self) -> &'static [&'static str] {
        match self {
            Platform::YouTube => &["__Secure-3PSID", "__Secure-1PSID", "SAPISID", "SSID"],
            Platform::Instagram => &["sessionid", "csrftoken", "ds_user_id"],
            Platform::Facebook => &["c_user", "xs"],
            Platform::TikTok => &[],
        }
    }

    /// Whether the bot asks the user to pick audio/video and a quality first.
    pub fn asks_for_format(self) -> bool {
        matches!(self, Platform::YouTube)
    }
}

/// `host + path` with a lowercased host, the string patterns are matched against.
fn match_target(url: &Url) -> Option<String> {
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    let host = url.host_str()?.to_ascii_lowercase();
    Some(format!("{}{}", host, url.path()))
}

/// One registry entry.
#[derive(Debug, Clone)]
pub struct MatchRule {
    pub platform: Platform,
    pub patterns: Vec<Regex>,
}

impl MatchRule {
    pub fn matches(&self, target: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(target))
    }
}

/// Ordered URL → platform registry.
#[derive(Debug, Clone)]
pub struct PlatformMatcher {
    rules: Vec<MatchRule>,
}

impl PlatformMatcher {
    /// Registry with the given rules, evaluated in order.
    pub fn from_rules(rules: Vec<MatchRule>) -> Self {
        Self { rules }
    }

    /// First platform whose rule matches, or `None` for unsupported URLs.
    pub fn resolve(&self, url: &Url) -> Option<Platform> {
        let target = match_target(url)?;
        self.rules.iter().find(|r| r.matches(&target)).map(|r| r.platform)
    }

    /// Platforms in evaluation order.
    pub fn platforms(&self) -> impl Iterator<Item = Platform> + '_ {
        self.rules.iter().map(|r| r.platform)
    }
}

impl Default for PlatformMatcher {
    fn default() -> Self {
        Self::from_rules(
            Platform::iter()
                .map(|platform| MatchRule {
                    platform,
                    patterns: platform.patterns().to_vec(),
                })
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_patterns_compile() {
        for platform in Platform::iter() {
            assert!(!platform.patterns().is_empty(), "{platform} has no patterns");
        }
    }

    fn resolve(url: &str) -> Option<Platform> {
        PlatformMatcher::default().resolve(&Url::parse(url).unwrap())
    }

    #[test]
    fn test_youtube_urls() {
        assert_eq!(resolve("https://www.youtube.com/watch?v=dQw4w9WgXcQ"), Some(Platform::YouTube));
        assert_eq!(resolve("https://youtu.be/dQw4w9WgXcQ"), Some(Platform::YouTube));
        assert_eq!(resolve("https://youtube.com/shorts/abc"), Some(Platform::YouTube));
        assert_eq!(resolve("https://music.youtube.com/watch?v=x"), Some(Platform::YouTube));
    }

    #[test]
    fn test_instagram_urls() {
        assert_eq!(resolve("https://www.instagram.com/p/ABC123/"), Some(Platform::Instagram));
        assert_eq!(resolve("https://instagram.com/reel/XYZ/?igsh=1"), Some(Platform::Instagram));
        assert_eq!(resolve("https://instagr.am/p/ABC/"), Some(Platform::Instagram));
        // profile pages are not media
        assert_eq!(resolve("https://www.instagram.com/someone/"), None);
    }

    #[test]
    fn test_facebook_and_tiktok_urls() {
        assert_eq!(resolve("https://m.facebook.com/watch/?v=1"), Some(Platform::Facebook));
        assert_eq!(resolve("https://fb.watch/abcDEF/"), Some(Platform::Facebook));
        assert_eq!(resolve("https://www.facebook.com/share/r/1ABC/"), Some(Platform::Facebook));
        assert_eq!(resolve("https://vm.tiktok.com/ZMabc/"), Some(Platform::TikTok));
        assert_eq!(resolve("https://www.tiktok.com/@user/video/123"), Some(Platform::TikTok));
    }

    #[test]
    fn test_unsupported_urls() {
        assert_eq!(resolve("https://vimeo.com/123"), None);
        assert_eq!(resolve("https://evil.example/youtube.com/watch"), None);
        assert_eq!(resolve("https://notyoutube.com/watch"), None);
        assert_eq!(resolve("ftp://youtube.com/watch"), None);
    }

    #[test]
    fn test_host_is_case_insensitive() {
        assert_eq!(resolve("https://WWW.YouTube.com/watch?v=x"), Some(Platform::YouTube));
    }

    #[test]
    fn test_registration_order_breaks_ties() {
        let shared = || vec![Regex::new(r"^example\.com/").unwrap()];
        let url = Url::parse("https://example.com/v/1").unwrap();

        let matcher = PlatformMatcher::from_rules(vec![
            MatchRule { platform: Platform::Facebook, patterns: shared() },
            MatchRule { platform: Platform::TikTok, patterns: shared() },
        ]);
        assert_eq!(matcher.resolve(&url), Some(Platform::Facebook));

        let matcher = PlatformMatcher::from_rules(vec![
            MatchRule { platform: Platform::TikTok, patterns: shared() },
            MatchRule { platform: Platform::Facebook, patterns: shared() },
        ]);
        assert_eq!(matcher.resolve(&url), Some(Platform::TikTok));
    }

    #[test]
    fn test_default_order() {
        let order: Vec<Platform> = PlatformMatcher::default().platforms().collect();
        assert_eq!(
            order,
            vec![Platform::YouTube, Platform::Instagram, Platform::Facebook, Platform::TikTok]
        );
    }

    #[test]
    fn test_policies() {
        assert_eq!(Platform::Instagram.cookie_policy(), CookiePolicy::Required);
        assert_eq!(Platform::YouTube.cookie_policy(), CookiePolicy::Optional);
        assert_eq!(Platform::TikTok.cookie_policy(), CookiePolicy::None);
        assert!(Platform::YouTube.asks_for_format());
        assert!(!Platform::TikTok.asks_for_format());
    }
}

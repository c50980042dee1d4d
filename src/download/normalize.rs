//! URL clean-up applied before extraction.

use url::Url;

use crate::download::platform::Platform;

/// Facebook tracking parameters that break the extractor's URL matching.
const FACEBOOK_TRACKING_PARAMS: &[&str] = &["mibextid", "sfnsn", "story_fbid", "substory_index", "rdid"];

/// Drops tracking noise the extractor does not need.
///
/// Instagram media URLs lose their whole query (`igsh`, `utm_*`); Facebook URLs
/// lose known tracking params; everything else passes through untouched.
pub fn clean_url(platform: Platform, url: &Url) -> Url {
    let mut cleaned = url.clone();
    cleaned.set_fragment(None);

    match platform {
        Platform::Instagram => cleaned.set_query(None),
        Platform::Facebook => {
            let kept: Vec<(String, String)> = url
                .query_pairs()
                .filter(|(k, _)| !FACEBOOK_TRACKING_PARAMS.contains(&k.as_ref()))
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect();
            if kept.is_empty() {
                cleaned.set_query(None);
            } else {
                cleaned.query_pairs_mut().clear().extend_pairs(kept);
            }
        }
        Platform::YouTube | Platform::TikTok => {}
    }
    cleaned
}

/// Facebook `/share/r/` and `/share/v/` links redirect to the real reel.
pub fn is_share_link(url: &Url) -> bool {
    let path = url.path();
    path.starts_with("/share/r/") || path.starts_with("/share/v/")
}

/// Follows redirects of a share link. Falls back to the input on any failure.
pub async fn expand_short_link(client: &reqwest::Client, url: &Url) -> Url {
    match client.get(url.as_str()).send().await {
        Ok(response) => {
            let resolved = response.url().clone();
            if resolved != *url {
                log::info!("🔗 Expanded {} -> {}", url, resolved);
            }
            resolved
        }
        Err(e) => {
            log::warn!("Could not expand {}: {}", url, e);
            url.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn u(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_instagram_query_stripped() {
        let cleaned = clean_url(Platform::Instagram, &u("https://www.instagram.com/reel/ABC/?igsh=xyz&utm_source=ig"));
        assert_eq!(cleaned.as_str(), "https://www.instagram.com/reel/ABC/");
    }

    #[test]
    fn test_facebook_tracking_stripped() {
        let cleaned = clean_url(Platform::Facebook, &u("https://www.facebook.com/watch/?v=123&mibextid=abc"));
        assert_eq!(cleaned.as_str(), "https://www.facebook.com/watch/?v=123");

        let cleaned = clean_url(Platform::Facebook, &u("https://www.facebook.com/reel/1?mibextid=abc"));
        assert_eq!(cleaned.as_str(), "https://www.facebook.com/reel/1");
    }

    #[test]
    fn test_youtube_untouched() {
        let url = u("https://www.youtube.com/watch?v=abc&t=30");
        assert_eq!(clean_url(Platform::YouTube, &url), url);
    }

    #[test]
    fn test_share_link_detection() {
        assert!(is_share_link(&u("https://www.facebook.com/share/r/1ABC/")));
        assert!(is_share_link(&u("https://www.facebook.com/share/v/1ABC/")));
        assert!(!is_share_link(&u("https://www.facebook.com/reel/1")));
    }

    #[tokio::test]
    async fn test_expand_short_link_follows_redirect() {
        let server = MockServer::start().await;
        let location = format!("{}/reel/42", server.uri());
        Mock::given(method("GET"))
            .and(path("/share/r/abc/"))
            .respond_with(ResponseTemplate::new(302).insert_header("Location", location.as_str()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/reel/42"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let start = u(&format!("{}/share/r/abc/", server.uri()));
        let expanded = expand_short_link(&client, &start).await;
        assert_eq!(expanded.path(), "/reel/42");
    }

    #[tokio::test]
    async fn test_expand_short_link_falls_back() {
        let client = reqwest::Client::new();
        let url = u("http://127.0.0.1:9/share/r/x/");
        assert_eq!(expand_short_link(&client, &url).await, url);
    }
}

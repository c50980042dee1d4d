//! Instagram photo posts.
//!
//! yt-dlp only knows about video, so an image-only post comes back as "no
//! video in this post". The post page still carries the picture in its
//! `og:image` tag; this module fetches it with the cookie jar's session.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use reqwest::header::{COOKIE, USER_AGENT};
use url::Url;

use crate::core::config;
use crate::download::error::DownloadError;

#[allow(clippy::expect_used)]
static SHORTCODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/(?:p|reel|reels|tv)/([A-Za-z0-9_-]+)").expect("shortcode regex"));

// `og:image` with its attributes in either order
#[allow(clippy::expect_used)]
static OG_IMAGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"<meta[^>]*?(?:property="og:image"[^>]*?content="([^"]+)"|content="([^"]+)"[^>]*?property="og:image")"#,
    )
    .expect("og:image regex")
});

/// Post shortcode from a `/p/<code>/`, `/reel/<code>/` or `/tv/<code>/` URL.
pub fn shortcode(url: &Url) -> Option<String> {
    SHORTCODE_RE
        .captures(url.path())
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// `Cookie` header value built from the Instagram entries of a Netscape jar.
pub fn cookie_header(jar: &str) -> String {
    jar.lines()
        .map(str::trim)
        .filter_map(|line| match line.strip_prefix("#HttpOnly_") {
            Some(rest) => Some(rest),
            None if line.is_empty() || line.starts_with('#') => None,
            None => Some(line),
        })
        .filter_map(|line| {
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() < 7 || !fields[0].trim_start_matches('.').ends_with("instagram.com") {
                return None;
            }
            Some(format!("{}={}", fields[5], fields[6]))
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// Image URL advertised by a post page.
pub fn og_image(html: &str) -> Option<String> {
    OG_IMAGE_RE
        .captures(html)
        .and_then(|c| c.get(1).or_else(|| c.get(2)))
        .map(|m| m.as_str().replace("&amp;", "&"))
}

/// Fetches the picture of an image-only post.
#[derive(Debug, Clone)]
pub struct PhotoFetcher {
    client: Client,
    base_url: String,
}

impl PhotoFetcher {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Downloads the post's image to `<output_dir>/<prefix>_<shortcode>.jpg`.
    pub async fn fetch(
        &self,
        post_url: &Url,
        cookies: &Path,
        output_dir: &Path,
        prefix: &str,
    ) -> Result<PathBuf, DownloadError> {
        let code = shortcode(post_url)
            .ok_or_else(|| DownloadError::FileNotFound(format!("no post shortcode in {}", post_url)))?;
        let jar = tokio::fs::read_to_string(cookies).await?;
        let cookie = cookie_header(&jar);

        let page_url = format!("{}/p/{}/", self.base_url, code);
        log::info!("📸 Fetching Instagram photo post {}", page_url);
        let response = self
            .client
            .get(&page_url)
            .header(USER_AGENT, config::instagram::USER_AGENT)
            .header(COOKIE, &cookie)
            .send()
            .await
            .map_err(|e| DownloadError::Network(format!("post page request failed: {}", e)))?;
        if !response.status().is_success() {
            return Err(DownloadError::Network(format!("post page returned {}", response.status())));
        }
        let html = response
            .text()
            .await
            .map_err(|e| DownloadError::Network(format!("post page body: {}", e)))?;

        let image_url =
            og_image(&html).ok_or_else(|| DownloadError::FileNotFound(format!("no image on post {}", code)))?;
        let image = self
            .client
            .get(&image_url)
            .header(USER_AGENT, config::instagram::USER_AGENT)
            .send()
            .await
            .map_err(|e| DownloadError::Network(format!("image request failed: {}", e)))?;
        if !image.status().is_success() {
            return Err(DownloadError::Network(format!("image returned {}", image.status())));
        }
        let bytes = image
            .bytes()
            .await
            .map_err(|e| DownloadError::Network(format!("image body: {}", e)))?;
        if bytes.is_empty() {
            return Err(DownloadError::FileNotFound(format!("empty image for post {}", code)));
        }

        let path = output_dir.join(format!("{}_{}.jpg", prefix, code));
        tokio::fs::write(&path, &bytes).await?;
        log::info!("📸 Saved {} ({} bytes)", path.display(), bytes.len());
        Ok(path)
    }
}

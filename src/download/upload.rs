//! Delivery decision and the external file host used for oversized files.

use std::path::Path;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client};
use serde::Deserialize;

use crate::download::error::DownloadError;
use crate::download::types::DownloadResult;

/// An external host that turns a local file into a shareable link.
#[async_trait]
pub trait FileHost: Send + Sync {
    fn name(&self) -> &'static str;

    /// Uploads `path` and returns the public download page.
    async fn upload(&self, path: &Path) -> Result<String, DownloadError>;

    /// Shown next to the link, e.g. how long the host keeps files.
    fn caveat(&self) -> &'static str;
}

/// How a finished download reaches the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Sent as a Telegram attachment
    Inline,
    /// Uploaded elsewhere; the user gets a link
    Link { url: String, caveat: &'static str },
}

/// Inline when the file fits the Bot API limit, otherwise a file-host link.
pub async fn deliver(
    result: &DownloadResult,
    max_inline_size: u64,
    host: &dyn FileHost,
) -> Result<Delivery, DownloadError> {
    if result.size_bytes <= max_inline_size {
        return Ok(Delivery::Inline);
    }

    log::info!(
        "📤 {} is {} bytes (limit {}), uploading to {}",
        result.file_name(),
        result.size_bytes,
        max_inline_size,
        host.name()
    );
    let url = host.upload(&result.local_path).await?;
    log::info!("📤 Uploaded {} -> {}", result.file_name(), url);
    Ok(Delivery::Link {
        url,
        caveat: host.caveat(),
    })
}

#[derive(Debug, Deserialize)]
struct GofileResponse<T> {
    status: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ServersData {
    servers: Vec<GofileServer>,
}

#[derive(Debug, Deserialize)]
struct GofileServer {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadData {
    download_page: String,
}

/// gofile.io: pick a server, then multipart-upload the file to it.
#[derive(Debug, Clone)]
pub struct GofileHost {
    client: Client,
    api_base: String,
    /// Replaces `https://{server}.gofile.io`; used against local mirrors
    upload_base: Option<String>,
}

impl GofileHost {
    pub fn new(client: Client, api_base: impl Into<String>) -> Self {
        Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            upload_base: None,
        }
    }

    pub fn with_upload_base(mut self, base: impl Into<String>) -> Self {
        self.upload_base = Some(base.into().trim_end_matches('/').to_string());
        self
    }

    async fn pick_server(&self) -> Result<String, DownloadError> {
        let response = self
            .client
            .get(format!("{}/servers", self.api_base))
            .send()
            .await
            .map_err(|e| DownloadError::Upload(format!("server lookup failed: {}", e)))?;
        if !response.status().is_success() {
            return Err(DownloadError::Upload(format!("server lookup returned {}", response.status())));
        }

        let body: GofileResponse<ServersData> = response
            .json()
            .await
            .map_err(|e| DownloadError::Upload(format!("bad server list: {}", e)))?;
        body.data
            .filter(|_| body.status == "ok")
            .and_then(|d| d.servers.into_iter().next())
            .map(|s| s.name)
            .ok_or_else(|| DownloadError::Upload(format!("no upload server available (status {})", body.status)))
    }
}

#[async_trait]
impl FileHost for GofileHost {
    fn name(&self) -> &'static str {
        "gofile.io"
    }

    async fn upload(&self, path: &Path) -> Result<String, DownloadError> {
        let server = self.pick_server().await?;
        let upload_url = match &self.upload_base {
            Some(base) => format!("{}/contents/uploadfile", base),
            None => format!("https://{}.gofile.io/contents/uploadfile", server),
        };

        let file = tokio::fs::File::open(path).await?;
        let len = file.metadata().await?.len();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string());
        let part = Part::stream_with_length(Body::from(file), len).file_name(file_name);
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(&upload_url)
            .timeout(crate::core::config::network::upload_timeout())
            .multipart(form)
            .send()
            .await
            .map_err(|e| DownloadError::Upload(format!("upload to {} failed: {}", server, e)))?;
        if !response.status().is_success() {
            return Err(DownloadError::Upload(format!("upload returned {}", response.status())));
        }

        let body: GofileResponse<UploadData> = response
            .json()
            .await
            .map_err(|e| DownloadError::Upload(format!("bad upload response: {}", e)))?;
        match body.data {
            Some(data) if body.status == "ok" => Ok(data.download_page),
            _ => Err(DownloadError::Upload(format!("upload rejected (status {})", body.status))),
        }
    }

    fn caveat(&self) -> &'static str {
        "The link stays valid for a limited time, download it soon."
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::types::MediaKind;
    use serde_json::json;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct FakeHost(AtomicUsize);

    #[async_trait]
    impl FileHost for FakeHost {
        fn name(&self) -> &'static str {
            "fake"
        }

        async fn upload(&self, _path: &Path) -> Result<String, DownloadError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok("https://files.example/abc".to_string())
        }

        fn caveat(&self) -> &'static str {
            "temporary"
        }
    }

    fn result(size_bytes: u64, path: PathBuf) -> DownloadResult {
        DownloadResult {
            local_path: path,
            size_bytes,
            title: None,
            duration: None,
            media_kind: MediaKind::Video,
        }
    }

    #[tokio::test]
    async fn test_small_file_is_inline() {
        let host = FakeHost(AtomicUsize::new(0));
        let limit = 50 * 1024 * 1024;
        assert_eq!(deliver(&result(limit, "a.mp4".into()), limit, &host).await.unwrap(), Delivery::Inline);
        assert_eq!(host.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_large_file_is_never_inline() {
        let host = FakeHost(AtomicUsize::new(0));
        let delivery = deliver(&result(120 * 1024 * 1024, "a.mp4".into()), 50 * 1024 * 1024, &host)
            .await
            .unwrap();
        assert_eq!(
            delivery,
            Delivery::Link {
                url: "https://files.example/abc".to_string(),
                caveat: "temporary"
            }
        );
    }

    #[tokio::test]
    async fn test_gofile_upload() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/servers"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "ok",
                "data": { "servers": [{ "name": "store1", "zone": "eu" }] }
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/contents/uploadfile"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "ok",
                "data": { "downloadPage": "https://gofile.io/d/AbCd", "code": "AbCd" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let file = dir.path().join("big.mp4");
        std::fs::write(&file, vec![7u8; 1024]).unwrap();

        let host = GofileHost::new(Client::new(), server.uri()).with_upload_base(server.uri());
        assert_eq!(host.upload(&file).await.unwrap(), "https://gofile.io/d/AbCd");
    }

    #[tokio::test]
    async fn test_gofile_rejection_is_upload_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/servers"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "error-noServer" })))
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let file = dir.path().join("big.mp4");
        std::fs::write(&file, b"x").unwrap();

        let host = GofileHost::new(Client::new(), server.uri());
        let err = host.upload(&file).await.unwrap_err();
        assert!(matches!(err, DownloadError::Upload(_)));
    }
}

//! OAuth 2.0 device-code flow for the YouTube token file.
//!
//! Operator tooling only: `mediarelay oauth setup` walks through the device
//! activation once, `mediarelay oauth refresh` renews the access token. The bot
//! itself never talks to the token endpoint, it only reads the file.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::core::config;
use crate::core::error::{AppError, AppResult};
use crate::download::credentials::OAuthToken;

const DEVICE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";

/// Answer of the device-code endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceCode {
    pub device_code: String,
    pub user_code: String,
    #[serde(alias = "verification_uri")]
    pub verification_url: String,
    #[serde(default = "default_interval")]
    pub interval: u64,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

fn default_interval() -> u64 {
    5
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<u64>,
    error: Option<String>,
    error_description: Option<String>,
}

impl TokenResponse {
    fn into_token(self, fallback_refresh: Option<String>) -> Option<OAuthToken> {
        Some(OAuthToken {
            access_token: self.access_token?,
            refresh_token: self.refresh_token.or(fallback_refresh),
            expires_in: self.expires_in,
            obtained_at: Some(chrono::Utc::now().timestamp()),
        })
    }

    fn describe_error(&self) -> String {
        match (&self.error, &self.error_description) {
            (Some(e), Some(d)) => format!("{}: {}", e, d),
            (Some(e), None) => e.clone(),
            _ => "token endpoint returned neither a token nor an error".to_string(),
        }
    }
}

pub struct DeviceFlow {
    client: reqwest::Client,
    device_code_url: String,
    token_url: String,
    client_id: String,
    client_secret: SecretString,
    scope: String,
}

impl DeviceFlow {
    pub fn new(client: reqwest::Client, client_id: impl Into<String>, client_secret: SecretString) -> Self {
        Self {
            client,
            device_code_url: config::oauth::DEVICE_CODE_URL.to_string(),
            token_url: config::oauth::TOKEN_URL.to_string(),
            client_id: client_id.into(),
            client_secret,
            scope: config::oauth::SCOPE.to_string(),
        }
    }

    /// Client credentials from YOUTUBE_OAUTH_CLIENT_ID / YOUTUBE_OAUTH_CLIENT_SECRET.
    pub fn from_env(client: reqwest::Client) -> AppResult<Self> {
        let (Some(id), Some(secret)) = (config::oauth::CLIENT_ID.clone(), config::oauth::CLIENT_SECRET.clone()) else {
            return Err(AppError::Validation(
                "YOUTUBE_OAUTH_CLIENT_ID and YOUTUBE_OAUTH_CLIENT_SECRET must be set".to_string(),
            ));
        };
        Ok(Self::new(client, id, SecretString::from(secret)))
    }

    /// Points both endpoints at `base` (`{base}/device/code`, `{base}/token`).
    pub fn with_base_url(mut self, base: &str) -> Self {
        let base = base.trim_end_matches('/');
        self.device_code_url = format!("{}/device/code", base);
        self.token_url = format!("{}/token", base);
        self
    }

    pub async fn request_device_code(&self) -> AppResult<DeviceCode> {
        let response = self
            .client
            .post(&self.device_code_url)
            .form(&[("client_id", self.client_id.as_str()), ("scope", self.scope.as_str())])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(AppError::HttpStatus(response.status()));
        }
        Ok(response.json().await?)
    }

    /// Polls until the user activates the code, the code expires or the server refuses.
    pub async fn poll(&self, code: &DeviceCode) -> AppResult<OAuthToken> {
        let mut interval = Duration::from_secs(code.interval);
        let deadline = tokio::time::Instant::now() + Duration::from_secs(code.expires_in.unwrap_or(1800));

        loop {
            let response: TokenResponse = self
                .client
                .post(&self.token_url)
                .form(&[
                    ("client_id", self.client_id.as_str()),
                    ("client_secret", self.client_secret.expose_secret()),
                    ("device_code", code.device_code.as_str()),
                    ("grant_type", DEVICE_GRANT),
                ])
                .send()
                .await?
                .json()
                .await?;

            match response.error.as_deref() {
                None => {
                    let description = response.describe_error();
                    return response
                        .into_token(None)
                        .ok_or(AppError::Validation(description));
                }
                Some("authorization_pending") => log::info!("⏳ Waiting for activation..."),
                Some("slow_down") => interval += Duration::from_secs(5),
                Some(_) => return Err(AppError::Validation(format!("OAuth error: {}", response.describe_error()))),
            }

            if tokio::time::Instant::now() + interval > deadline {
                return Err(AppError::Validation("device code expired before activation".to_string()));
            }
            tokio::time::sleep(interval).await;
        }
    }

    /// New access token; the refresh token is carried over when the server omits it.
    pub async fn refresh(&self, token: &OAuthToken) -> AppResult<OAuthToken> {
        let refresh_token = token
            .refresh_token
            .clone()
            .ok_or_else(|| AppError::Validation("token file has no refresh_token, run `oauth setup`".to_string()))?;

        let response = self
            .client
            .post(&self.token_url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.expose_secret()),
                ("refresh_token", refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(AppError::HttpStatus(response.status()));
        }

        let body: TokenResponse = response.json().await?;
        let description = body.describe_error();
        body.into_token(Some(refresh_token))
            .ok_or(AppError::Validation(description))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn flow(server: &MockServer) -> DeviceFlow {
        DeviceFlow::new(reqwest::Client::new(), "client-id", SecretString::from("client-secret".to_string()))
            .with_base_url(&server.uri())
    }

    #[tokio::test]
    async fn test_device_code_and_poll() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/device/code"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "device_code": "dev-123",
                "user_code": "ABCD-EFGH",
                "verification_url": "https://www.google.com/device",
                "interval": 0,
                "expires_in": 1800
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(428).set_body_json(json!({ "error": "authorization_pending" })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("device_code=dev-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "ya29.access",
                "refresh_token": "1//refresh",
                "expires_in": 3599
            })))
            .mount(&server)
            .await;

        let flow = flow(&server);
        let code = flow.request_device_code().await.unwrap();
        assert_eq!(code.user_code, "ABCD-EFGH");

        let token = flow.poll(&code).await.unwrap();
        assert_eq!(token.access_token, "ya29.access");
        assert_eq!(token.refresh_token.as_deref(), Some("1//refresh"));
        assert!(token.obtained_at.is_some());
    }

    #[tokio::test]
    async fn test_poll_stops_on_access_denied() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({ "error": "access_denied" })))
            .mount(&server)
            .await;

        let code = DeviceCode {
            device_code: "dev".into(),
            user_code: "X".into(),
            verification_url: "https://example.test".into(),
            interval: 0,
            expires_in: Some(60),
        };
        let err = flow(&server).poll(&code).await.unwrap_err();
        assert!(err.to_string().contains("access_denied"));
    }

    #[tokio::test]
    async fn test_refresh_keeps_refresh_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "ya29.new",
                "expires_in": 3599
            })))
            .mount(&server)
            .await;

        let old = OAuthToken {
            access_token: "ya29.old".into(),
            refresh_token: Some("1//keep".into()),
            expires_in: Some(3599),
            obtained_at: Some(0),
        };
        let fresh = flow(&server).refresh(&old).await.unwrap();
        assert_eq!(fresh.access_token, "ya29.new");
        assert_eq!(fresh.refresh_token.as_deref(), Some("1//keep"));
    }

    #[tokio::test]
    async fn test_refresh_without_refresh_token() {
        let server = MockServer::start().await;
        let token = OAuthToken {
            access_token: "a".into(),
            refresh_token: None,
            expires_in: None,
            obtained_at: None,
        };
        assert!(flow(&server).refresh(&token).await.is_err());
    }
}

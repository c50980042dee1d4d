//! Credential artifacts: cookie jars and the YouTube OAuth token.
//!
//! The bot only reads these files. They are produced out of band (browser
//! export, `mediarelay oauth setup`) and may be stale or missing at any time;
//! the only freshness check is "file exists and has a non-trivial size".

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::core::config;
use crate::core::error::AppResult;
use crate::download::platform::Platform;

/// How a platform treats a missing credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CookiePolicy {
    /// Refuse the request up front
    Required,
    /// Attach when present, otherwise go anonymous
    Optional,
    /// Never attach
    None,
}

/// Credential attached to every extraction attempt for a request.
#[derive(Debug, Clone)]
pub enum Credential {
    CookieFile(PathBuf),
    OAuthBearer(SecretString),
}

impl Credential {
    /// yt-dlp arguments carrying this credential.
    ///
    /// Secrets never go on the command line, where any local user can read
    /// them; a bearer token travels in [`config_file_body`](Self::config_file_body).
    pub fn to_args(&self) -> Vec<String> {
        match self {
            Credential::CookieFile(path) => vec!["--cookies".to_string(), path.to_string_lossy().into_owned()],
            Credential::OAuthBearer(_) => Vec::new(),
        }
    }

    /// Contents of a private yt-dlp config file, for credentials that need one.
    pub fn config_file_body(&self) -> Option<SecretString> {
        match self {
            Credential::CookieFile(_) => None,
            Credential::OAuthBearer(token) => Some(SecretString::from(format!(
                "--add-header \"Authorization:Bearer {}\"\n",
                token.expose_secret()
            ))),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Credential::CookieFile(_) => "cookies",
            Credential::OAuthBearer(_) => "oauth",
        }
    }
}

/// Where credential artifacts live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialPaths {
    /// Instagram and Facebook cookie jar
    pub cookies_file: PathBuf,
    pub youtube_cookies_file: PathBuf,
    pub youtube_oauth_token: PathBuf,
}

impl CredentialPaths {
    /// The credential to attach for `platform`, if one is usable right now.
    pub fn for_platform(&self, platform: Platform) -> Option<Credential> {
        match platform {
            Platform::YouTube => {
                if is_usable(&self.youtube_cookies_file) {
                    return Some(Credential::CookieFile(self.youtube_cookies_file.clone()));
                }
                if !is_usable(&self.youtube_oauth_token) {
                    return None;
                }
                match OAuthToken::load(&self.youtube_oauth_token) {
                    Ok(token) if !token.access_token.trim().is_empty() => {
                        Some(Credential::OAuthBearer(SecretString::from(token.access_token)))
                    }
                    Ok(_) => None,
                    Err(e) => {
                        log::warn!(
                            "Ignoring unreadable OAuth token {}: {}",
                            self.youtube_oauth_token.display(),
                            e
                        );
                        None
                    }
                }
            }
            Platform::Instagram | Platform::Facebook => {
                is_usable(&self.cookies_file).then(|| Credential::CookieFile(self.cookies_file.clone()))
            }
            Platform::TikTok => None,
        }
    }

    /// Distinct artifact paths, in a stable order.
    pub fn all(&self) -> Vec<&Path> {
        let mut paths: Vec<&Path> = Vec::with_capacity(3);
        for p in [&self.cookies_file, &self.youtube_cookies_file, &self.youtube_oauth_token] {
            if !paths.contains(&p.as_path()) {
                paths.push(p.as_path());
            }
        }
        paths
    }
}

/// "Exists and has a non-trivial size."
pub fn is_usable(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.len() >= config::credentials::MIN_SIZE_BYTES)
        .unwrap_or(false)
}

/// Copies artifacts found in `source_dir` to their configured scratch paths.
///
/// A file is picked up when its name matches the file name of a configured
/// path. Returns the destinations that were written.
pub fn install_from_dir(source_dir: &Path, paths: &CredentialPaths) -> AppResult<Vec<PathBuf>> {
    let mut installed = Vec::new();
    for dest in paths.all() {
        let Some(name) = dest.file_name() else {
            continue;
        };
        let src = source_dir.join(name);
        if !src.is_file() || src == dest {
            continue;
        }
        if let Some(parent) = dest.parent() {
            if !parent.as_os_str().is_empty() {
                fs_err::create_dir_all(parent)?;
            }
        }
        fs_err::copy(&src, dest)?;
        log::info!("Installed credential {} -> {}", src.display(), dest.display());
        installed.push(dest.to_path_buf());
    }
    Ok(installed)
}

/// OAuth token file as written by the device-code helper.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OAuthToken {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    /// Unix timestamp the token was obtained at
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub obtained_at: Option<i64>,
}

impl OAuthToken {
    pub fn load(path: &Path) -> AppResult<Self> {
        let raw = fs_err::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn save(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs_err::create_dir_all(parent)?;
            }
        }
        fs_err::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Whether the token is past its lifetime at `now` (unix seconds). Unknown means not expired.
    pub fn is_expired_at(&self, now: i64) -> bool {
        match (self.obtained_at, self.expires_in) {
            (Some(obtained), Some(ttl)) => obtained.saturating_add(ttl as i64) <= now,
            _ => false,
        }
    }
}

/// Summary of a Netscape cookie jar, for diagnostics only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieReport {
    pub header_present: bool,
    pub total: usize,
    /// Cookie count per domain (leading dot stripped)
    pub domains: BTreeMap<String, usize>,
    pub missing_critical: Vec<String>,
}

/// Parses a Netscape cookie file and checks for the given cookie names.
pub fn inspect_cookie_file(path: &Path, critical: &[&str]) -> AppResult<CookieReport> {
    let content = fs_err::read_to_string(path)?;
    Ok(inspect_cookie_text(&content, critical))
}

pub fn inspect_cookie_text(content: &str, critical: &[&str]) -> CookieReport {
    let mut report = CookieReport {
        header_present: content.lines().next().is_some_and(|l| {
            l.starts_with("# Netscape HTTP Cookie File") || l.starts_with("# HTTP Cookie File")
        }),
        ..Default::default()
    };
    let mut names = Vec::new();

    for line in content.lines() {
        let line = line.trim();
        // `#HttpOnly_` prefixed lines are cookies, other `#` lines are comments
        let line = match line.strip_prefix("#HttpOnly_") {
            Some(rest) => rest,
            None if line.is_empty() || line.starts_with('#') => continue,
            None => line,
        };

        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 7 {
            continue;
        }
        let domain = fields[0].trim_start_matches('.').to_string();
        *report.domains.entry(domain).or_insert(0) += 1;
        names.push(fields[5].to_string());
        report.total += 1;
    }

    report.missing_critical = critical
        .iter()
        .filter(|name| !names.iter().any(|n| n == *name))
        .map(|name| name.to_string())
        .collect();
    report
}

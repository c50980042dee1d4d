//! Logging initialization and credential configuration checking
//!
//! This module provides:
//! - Logger initialization (console + file)
//! - Startup report of which platforms have usable credentials

use anyhow::Result;
use simplelog::*;
use std::fs::{File, OpenOptions};
use strum::IntoEnumIterator;

use crate::download::credentials::{self, CookiePolicy, Credential, CredentialPaths};
use crate::download::platform::Platform;

const BANNER: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

/// Opens the log file for appending, creating it if needed.
///
/// Never truncates: another process may be writing to the same file.
pub fn open_log_file(log_file_path: &str) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file_path)
        .map_err(|e| anyhow::anyhow!("Failed to open log file {}: {}", log_file_path, e))
}

/// Initialize logger for both console and file output
///
/// # Arguments
/// * `log_file_path` - Path to the log file
pub fn init_logger(log_file_path: &str) -> Result<()> {
    let log_file = open_log_file(log_file_path)?;

    let config = ConfigBuilder::new()
        .add_filter_ignore_str("hyper")
        .add_filter_ignore_str("reqwest")
        .build();

    CombinedLogger::init(vec![
        TermLogger::new(LevelFilter::Info, config.clone(), TerminalMode::Mixed, ColorChoice::Auto),
        WriteLogger::new(LevelFilter::Debug, config, log_file),
    ])
    .map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))?;

    Ok(())
}

/// Logs, per platform, whether a credential artifact will be attached to extractions.
///
/// Never fails: a missing credential is only fatal for `Required` platforms, and
/// only when a request for that platform actually arrives.
pub fn log_credentials_configuration(paths: &CredentialPaths) {
    log::info!("{}", BANNER);
    log::info!("🍪 Credentials Configuration Check");
    log::info!("{}", BANNER);

    let mut missing_required = Vec::new();

    for platform in Platform::iter() {
        let policy = platform.cookie_policy();
        match paths.for_platform(platform) {
            Some(Credential::CookieFile(path)) => {
                log::info!("✅ {}: cookies from {}", platform, path.display());
                let report = credentials::inspect_cookie_file(&path, platform.critical_cookies());
                match report {
                    Ok(report) if !report.missing_critical.is_empty() => {
                        log::warn!(
                            "⚠️  {}: cookie file lacks {}",
                            platform,
                            report.missing_critical.join(", ")
                        );
                    }
                    Ok(report) => log::info!("   {} cookies across {} domain(s)", report.total, report.domains.len()),
                    Err(e) => log::warn!("⚠️  {}: cannot read cookie file: {}", platform, e),
                }
            }
            Some(Credential::OAuthBearer(_)) => {
                log::info!("✅ {}: OAuth token from {}", platform, paths.youtube_oauth_token.display());
            }
            None => match policy {
                CookiePolicy::Required => {
                    log::error!("❌ {}: no credentials, requests will be refused", platform);
                    missing_required.push(platform);
                }
                CookiePolicy::Optional => log::warn!("⚠️  {}: no credentials, anonymous access only", platform),
                CookiePolicy::None => log::info!("ℹ️  {}: credentials not used", platform),
            },
        }
    }

    log::info!("{}", BANNER);
    if missing_required.is_empty() {
        log::info!("✅ Credentials configured for every platform that needs them");
    } else {
        log::error!(
            "❌ Missing required credentials for: {}",
            missing_required.iter().map(|p| p.to_string()).collect::<Vec<_>>().join(", ")
        );
        log::error!("   Export a Netscape cookie file to {}", paths.cookies_file.display());
    }
    log::info!("{}", BANNER);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_open_log_file_keeps_existing_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bot.log");
        std::fs::write(&path, "line from the running bot\n").unwrap();

        let mut file = open_log_file(path.to_str().unwrap()).unwrap();
        writeln!(file, "line from a second start").unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "line from the running bot\nline from a second start\n");
    }

    #[test]
    fn test_open_log_file_creates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fresh.log");

        open_log_file(path.to_str().unwrap()).unwrap();
        assert!(path.exists());
    }
}

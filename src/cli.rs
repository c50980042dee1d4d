use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "mediarelay")]
#[command(author, version, about = "Telegram bot that fetches media from YouTube, Instagram, Facebook and TikTok", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the bot (long polling)
    Run,

    /// Download a single URL through the same pipeline the bot uses
    Download {
        /// URL to download
        url: String,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = FormatArg::Default)]
        format: FormatArg,

        /// Video height: 360, 480, 720 or 1080
        #[arg(short, long)]
        quality: Option<String>,

        /// Directory to write the file to (defaults to DOWNLOAD_FOLDER)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Clean the download directory once and exit
    Sweep {
        /// Remove every file regardless of age
        #[arg(long)]
        all: bool,
    },

    /// Report which platforms have usable credentials
    CheckCredentials,

    /// YouTube OAuth token management
    Oauth {
        #[command(subcommand)]
        action: OauthAction,
    },
}

#[derive(Subcommand, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OauthAction {
    /// Interactive device-code activation; writes the token file
    Setup,
    /// Renew the access token in the token file
    Refresh,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormatArg {
    Audio,
    Video,
    Default,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_no_subcommand_means_run() {
        let cli = Cli::try_parse_from(["mediarelay"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_download_args() {
        let cli = Cli::try_parse_from(["mediarelay", "download", "https://youtu.be/x", "-f", "audio"]).unwrap();
        match cli.command {
            Some(Commands::Download { url, format, quality, .. }) => {
                assert_eq!(url, "https://youtu.be/x");
                assert_eq!(format, FormatArg::Audio);
                assert!(quality.is_none());
            }
            _ => panic!("expected download"),
        }
    }

    #[test]
    fn test_oauth_and_sweep() {
        let cli = Cli::try_parse_from(["mediarelay", "oauth", "refresh"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Oauth { action: OauthAction::Refresh })));

        let cli = Cli::try_parse_from(["mediarelay", "sweep", "--all"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Sweep { all: true })));
    }
}

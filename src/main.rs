use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use dotenvy::dotenv;
use teloxide::prelude::*;
use teloxide::update_listeners::Polling;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;

use mediarelay::cli::{Cli, Commands, FormatArg, OauthAction};
use mediarelay::context::AppContext;
use mediarelay::core::utils::format_bytes;
use mediarelay::core::{config, init_logger, log_credentials_configuration, process, InstanceLock, Settings};
use mediarelay::download::credentials::{self, OAuthToken};
use mediarelay::download::{DownloadRequest, LeaseRegistry, MediaFormat, ProgressEvent, Sweeper, VideoQuality};
use mediarelay::oauth::DeviceFlow;
use mediarelay::telegram::{create_bot, schema, setup_bot_commands, HandlerDeps};

/// Main entry point
///
/// Parses CLI arguments and dispatches to the appropriate subcommand.
/// Without a subcommand the bot runs.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    // Log panics from spawned request tasks instead of losing them
    std::panic::set_hook(Box::new(|panic_info| {
        log::error!("Panic caught: {:?}", panic_info);
        if let Some(location) = panic_info.location() {
            log::error!("Panic at {}:{}:{}", location.file(), location.line(), location.column());
        }
        if let Some(msg) = panic_info.payload().downcast_ref::<&str>() {
            log::error!("Panic message: {}", msg);
        }
    }));

    // .env first so LOG_FILE_PATH and friends can come from it
    let _ = dotenv();

    // The lock comes before the logger: a refused start must not touch the live log
    let lock = match cli.command {
        Some(Commands::Run) | None | Some(Commands::Sweep { .. }) => {
            Some(InstanceLock::acquire(Settings::from_env().lock_path)?)
        }
        _ => None,
    };

    init_logger(&config::LOG_FILE_PATH)?;
    if let Some(lock) = &lock {
        log::info!("🔒 Holding instance lock {}", lock.path().display());
    }

    match cli.command {
        Some(Commands::Run) | None => run_bot().await,
        Some(Commands::Download {
            url,
            format,
            quality,
            output_dir,
        }) => run_cli_download(url, format, quality, output_dir).await,
        Some(Commands::Sweep { all }) => run_sweep(all),
        Some(Commands::CheckCredentials) => run_check_credentials().await,
        Some(Commands::Oauth { action }) => run_oauth(action).await,
    }
}

/// Startup checks shared by the bot and the CLI download.
async fn prepare_environment(settings: &Settings) -> Result<()> {
    if let Some(source_dir) = config::CREDENTIALS_SOURCE_DIR.as_deref() {
        let source_dir = config::expand_path(source_dir);
        match credentials::install_from_dir(&source_dir, &settings.credentials) {
            Ok(installed) => log::info!("Installed {} credential file(s) from {}", installed.len(), source_dir.display()),
            Err(e) => log::warn!("Could not install credentials from {}: {}", source_dir.display(), e),
        }
    }

    match process::ytdlp_version(&settings.ytdl_bin).await {
        Ok(version) => log::info!("yt-dlp version: {}", version),
        Err(e) => log::error!("❌ yt-dlp is not usable ({}): {}", settings.ytdl_bin, e),
    }
    if process::detect_js_runtime().is_none() {
        log::warn!(
            "⚠️  No JavaScript runtime found ({}); YouTube extraction may fail",
            config::download::JS_RUNTIMES.join(", ")
        );
    }

    fs_err::create_dir_all(&settings.download_dir)?;
    log_credentials_configuration(&settings.credentials);
    Ok(())
}

async fn run_bot() -> Result<()> {
    log::info!("Starting bot...");
    let settings = Settings::from_env();
    prepare_environment(&settings).await?;
    let ctx = Arc::new(AppContext::new(settings)?);

    let startup = ctx.sweeper().sweep_all();
    log::info!("🧹 Startup sweep removed {} file(s)", startup.deleted);

    let cancel = CancellationToken::new();
    let sweeper_task = ctx.sweeper().spawn(ctx.settings.sweep_interval, cancel.clone());

    let served = serve(Arc::clone(&ctx)).await;

    cancel.cancel();
    if let Err(e) = sweeper_task.await {
        log::warn!("Sweeper task ended abnormally: {}", e);
    }
    let shutdown = ctx.sweeper().sweep_all();
    log::info!("🧹 Shutdown sweep removed {} file(s)", shutdown.deleted);

    served
}

async fn serve(ctx: Arc<AppContext>) -> Result<()> {
    let bot = create_bot()?;

    let me = bot.get_me().await?;
    log::info!("Bot username: {:?}, Bot ID: {}", me.username, me.id);

    if let Err(e) = setup_bot_commands(&bot).await {
        log::warn!("Failed to set bot commands: {}", e);
    }

    let deps = HandlerDeps::new(ctx, me.username.clone(), me.id);
    let listener = Polling::builder(bot.clone()).drop_pending_updates().build();

    Dispatcher::builder(bot, schema(deps))
        .enable_ctrlc_handler()
        .build()
        .dispatch_with_listener(
            listener,
            LoggingErrorHandler::with_custom_text("An error from the update listener"),
        )
        .await;

    log::info!("Dispatcher shutdown gracefully");
    Ok(())
}

async fn run_cli_download(
    url: String,
    format: FormatArg,
    quality: Option<String>,
    output_dir: Option<PathBuf>,
) -> Result<()> {
    let mut settings = Settings::from_env();
    if let Some(dir) = output_dir {
        settings.download_dir = dir;
    }
    prepare_environment(&settings).await?;

    let url = Url::parse(&url)?;
    let quality = quality
        .map(|q| VideoQuality::parse(&q).ok_or_else(|| anyhow::anyhow!("Unsupported quality {}: use 360, 480, 720 or 1080", q)))
        .transpose()?;
    let format = match format {
        FormatArg::Audio => MediaFormat::Audio,
        FormatArg::Video => MediaFormat::Video,
        FormatArg::Default => MediaFormat::Default,
    };
    let request = DownloadRequest::new(url, format, quality);

    println!("🎬 mediarelay download");
    println!("URL: {}", request.url);

    let ctx = AppContext::new(settings)?;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                ProgressEvent::Attempt { persona, index, total } => println!("▶️  Attempt {}/{} ({})", index, total, persona),
                ProgressEvent::Downloading(info) => {
                    print!("\r⬇️  {:>3}%", info.percent);
                    let _ = std::io::stdout().flush();
                }
                ProgressEvent::Processing => println!("\n🔄 Processing..."),
            }
        }
    });

    let outcome = ctx.download(&request, tx).await;
    let _ = printer.await;

    match outcome {
        Ok((result, _lease)) => {
            println!(
                "\n✅ {} ({})",
                result.local_path.display(),
                format_bytes(result.size_bytes)
            );
            Ok(())
        }
        Err(e) => {
            eprintln!("\n{}", e.user_message());
            Err(e.into())
        }
    }
}

fn run_sweep(all: bool) -> Result<()> {
    let settings = Settings::from_env();
    let sweeper = Sweeper::new(&settings.download_dir, settings.retention, LeaseRegistry::new());
    let report = if all { sweeper.sweep_all() } else { sweeper.sweep() };
    println!(
        "🧹 {}: scanned {}, deleted {}, errors {}",
        sweeper.dir().display(),
        report.scanned,
        report.deleted,
        report.errors
    );
    Ok(())
}

async fn run_check_credentials() -> Result<()> {
    let settings = Settings::from_env();
    prepare_environment(&settings).await
}

async fn run_oauth(action: OauthAction) -> Result<()> {
    let settings = Settings::from_env();
    let token_path = settings.credentials.youtube_oauth_token;
    let flow = DeviceFlow::from_env(reqwest::Client::builder().timeout(config::network::timeout()).build()?)?;

    let token = match action {
        OauthAction::Setup => {
            let code = flow.request_device_code().await?;
            println!("🔐 YouTube OAuth setup");
            println!("📱 Open {} in a browser", code.verification_url);
            println!("🔑 Enter the code: {}", code.user_code);
            println!("⏳ Waiting for activation...");
            flow.poll(&code).await?
        }
        OauthAction::Refresh => {
            let current = OAuthToken::load(&token_path)?;
            flow.refresh(&current).await?
        }
    };

    token.save(&token_path)?;
    println!("✅ Token saved to {}", token_path.display());
    if let Some(expires_in) = token.expires_in {
        println!("⏰ Expires in {}s", expires_in);
    }
    Ok(())
}

//! Dispatcher schema and handler chain builders

use indoc::indoc;
use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::{ChatKind, Message};

use super::flow::spawn_request;
use super::types::{HandlerDeps, HandlerError};
use crate::core::utils::first_url;
use crate::download::error::DownloadError;
use crate::download::types::{DownloadRequest, MediaFormat};
use crate::telegram::bot::{is_message_addressed_to_bot, Command};
use crate::telegram::keyboard::{format_keyboard, quality_keyboard, CallbackAction};

const WELCOME: &str = indoc! {"
    👋 Send me a link and I will send back the media.

    Supported: YouTube (audio or video), Instagram, Facebook and TikTok.
    Files larger than Telegram allows are uploaded to a file host and you get a link."};

/// Creates the main dispatcher schema for the Telegram bot.
///
/// The same schema is used in production and in integration tests.
pub fn schema(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    let deps_commands = deps.clone();
    let deps_messages = deps.clone();
    let deps_callback = deps;

    dptree::entry()
        .branch(command_handler(deps_commands))
        .branch(message_handler(deps_messages))
        .branch(callback_handler(deps_callback))
}

fn command_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message().branch(dptree::entry().filter_command::<Command>().endpoint(
        move |bot: Bot, msg: Message, cmd: Command| {
            let deps = deps.clone();
            async move {
                log::info!("🎯 Received command: {:?} from chat {}", cmd, msg.chat.id);
                match cmd {
                    Command::Start | Command::Help => {
                        deps.pending.clear_chat(msg.chat.id);
                        if let Err(e) = bot.send_message(msg.chat.id, WELCOME).await {
                            log::warn!("Failed to send welcome to chat {}: {}", msg.chat.id, e);
                        }
                    }
                }
                Ok(())
            }
        },
    ))
}

fn message_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    let bot_username = deps.bot_username.clone();
    let bot_id = deps.bot_id;

    Update::filter_message()
        .filter(move |msg: Message| is_message_addressed_to_bot(&msg, bot_username.as_deref(), bot_id))
        .endpoint(move |bot: Bot, msg: Message| {
            let deps = deps.clone();
            async move {
                if let Err(e) = handle_link_message(&bot, &deps, &msg).await {
                    log::error!("❌ Message handler failed for chat {}: {}", msg.chat.id, e);
                }
                Ok(())
            }
        })
}

async fn handle_link_message(bot: &Bot, deps: &HandlerDeps, msg: &Message) -> Result<(), teloxide::RequestError> {
    let chat_id = msg.chat.id;
    let Some(text) = msg.text() else {
        return Ok(());
    };
    log::info!("📨 Message in chat {}: {}", chat_id, text.chars().take(100).collect::<String>());

    let Some(url) = first_url(text) else {
        // groups are noisy; only nag in private chats
        if matches!(msg.chat.kind, ChatKind::Private(_)) {
            bot.send_message(chat_id, "Please send a link.").await?;
        }
        return Ok(());
    };

    let Some(platform) = deps.ctx.resolve(&url) else {
        log::info!("Unsupported URL from chat {}: {}", chat_id, url);
        bot.send_message(chat_id, DownloadError::UnsupportedPlatform(url.to_string()).user_message())
            .await?;
        return Ok(());
    };

    if platform.asks_for_format() {
        let keyboard = bot
            .send_message(chat_id, "Choose a format:")
            .reply_markup(format_keyboard())
            .await?;
        deps.pending.insert(chat_id, keyboard.id, url);
        return Ok(());
    }

    let request = DownloadRequest::new(url, MediaFormat::Default, None);
    spawn_request(bot.clone(), deps.clone(), chat_id, platform, request);
    Ok(())
}

fn callback_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_callback_query().endpoint(move |bot: Bot, q: CallbackQuery| {
        let deps = deps.clone();
        async move {
            if let Err(e) = handle_callback(&bot, &deps, q).await {
                log::error!("❌ Callback handler failed: {}", e);
            }
            Ok(())
        }
    })
}

async fn handle_callback(bot: &Bot, deps: &HandlerDeps, q: CallbackQuery) -> Result<(), teloxide::RequestError> {
    bot.answer_callback_query(q.id.clone()).await?;

    let Some(message) = q.message.as_ref() else {
        return Ok(());
    };
    let chat_id = message.chat().id;
    let message_id = message.id();
    let Some(action) = q.data.as_deref().and_then(CallbackAction::parse) else {
        log::debug!("Ignoring unknown callback data {:?}", q.data);
        return Ok(());
    };

    // The quality keyboard replaces the format keyboard in the same message
    let Some(url) = deps.pending.peek(chat_id, message_id) else {
        bot.edit_message_text(chat_id, message_id, "❌ Link not found. Please send the URL again.")
            .await?;
        return Ok(());
    };
    let Some(platform) = deps.ctx.resolve(&url) else {
        deps.pending.take(chat_id, message_id);
        return Ok(());
    };

    let request = match action {
        CallbackAction::Video => {
            bot.edit_message_text(chat_id, message_id, "Choose a video quality:")
                .reply_markup(quality_keyboard())
                .await?;
            return Ok(());
        }
        CallbackAction::Audio => {
            bot.edit_message_text(chat_id, message_id, "🎵 Audio (MP3)").await?;
            DownloadRequest::audio(url)
        }
        CallbackAction::Quality(quality) => {
            bot.edit_message_text(chat_id, message_id, format!("🎬 Video {}", quality))
                .await?;
            DownloadRequest::video(url, quality)
        }
    };

    deps.pending.take(chat_id, message_id);
    log::info!("🎯 Chat {} chose {:?} for {}", chat_id, action, request.url);
    spawn_request(bot.clone(), deps.clone(), chat_id, platform, request);
    Ok(())
}

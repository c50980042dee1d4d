//! Bot initialization and message routing utilities
//!
//! This module contains:
//! - Command enum definition
//! - Bot instance creation
//! - Message addressing logic (private chats, mentions, replies)

use reqwest::ClientBuilder;
use teloxide::prelude::*;
use teloxide::types::{BotCommand, ChatKind, Message, MessageEntityKind, UserId};
use teloxide::utils::command::BotCommands;

use crate::core::config;

/// Bot commands enum with descriptions
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "I can:")]
pub enum Command {
    #[command(description = "show the welcome message")]
    Start,
    #[command(description = "list supported platforms")]
    Help,
}

/// Creates a Bot instance with custom or default API URL
///
/// The token is read from TELEGRAM_BOT_TOKEN, BOT_TOKEN or TELOXIDE_TOKEN.
pub fn create_bot() -> anyhow::Result<Bot> {
    if config::BOT_TOKEN.is_empty() {
        anyhow::bail!("No bot token: set TELEGRAM_BOT_TOKEN (or BOT_TOKEN / TELOXIDE_TOKEN)");
    }

    let client = ClientBuilder::new().timeout(config::network::timeout()).build()?;
    let bot = Bot::with_client(config::BOT_TOKEN.as_str(), client);

    // Check if local Bot API server is configured
    let bot = match config::BOT_API_URL.as_deref() {
        Some(bot_api_url) => {
            log::info!("Using custom Bot API URL: {}", bot_api_url);
            let url = url::Url::parse(bot_api_url).map_err(|e| anyhow::anyhow!("Invalid BOT_API_URL: {}", e))?;
            bot.set_api_url(url)
        }
        None => bot,
    };

    Ok(bot)
}

/// Sets up bot commands in Telegram UI
pub async fn setup_bot_commands(bot: &Bot) -> Result<(), teloxide::RequestError> {
    bot.set_my_commands(vec![
        BotCommand::new("start", "show the welcome message"),
        BotCommand::new("help", "list supported platforms"),
    ])
    .await?;

    Ok(())
}

/// Checks if a message is addressed to the bot
///
/// # Arguments
/// * `msg` - Message to check
/// * `bot_username` - Bot's username (without @)
/// * `bot_id` - Bot's user ID
///
/// # Returns
/// * `true` if message is addressed to bot (private chat, bot mention, reply to bot message)
/// * `false` if message is not addressed to bot
pub fn is_message_addressed_to_bot(msg: &Message, bot_username: Option<&str>, bot_id: UserId) -> bool {
    if matches!(msg.chat.kind, ChatKind::Private(_)) {
        return true;
    }

    let replied_to_bot = msg
        .reply_to_message()
        .and_then(|reply| reply.from.as_ref())
        .is_some_and(|from| from.id == bot_id);
    if replied_to_bot {
        return true;
    }

    let (Some(text), Some(username)) = (msg.text(), bot_username) else {
        return false;
    };
    mentions_username(text, msg.entities().unwrap_or_default(), username)
}

/// Whether `text` mentions `@username`, either as a mention entity or literally.
fn mentions_username(text: &str, entities: &[teloxide::types::MessageEntity], username: &str) -> bool {
    // entity offsets are UTF-16 code units
    let utf16: Vec<u16> = text.encode_utf16().collect();
    let by_entity = entities
        .iter()
        .filter(|entity| matches!(entity.kind, MessageEntityKind::Mention))
        .filter_map(|entity| utf16.get(entity.offset..entity.offset + entity.length))
        .map(String::from_utf16_lossy)
        .any(|mention| {
            mention
                .strip_prefix('@')
                .is_some_and(|name| name.eq_ignore_ascii_case(username))
        });

    by_entity || text.to_lowercase().contains(&format!("@{}", username.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use teloxide::types::MessageEntity;

    #[test]
    fn test_command_descriptions() {
        let command_list = Command::descriptions().to_string();
        assert!(command_list.contains("I can"));
        assert!(command_list.contains("start"));
        assert!(command_list.contains("help"));
    }

    #[test]
    fn test_command_parse() {
        assert_eq!(Command::parse("/start", "relay_bot").unwrap(), Command::Start);
        assert_eq!(Command::parse("/help@relay_bot", "relay_bot").unwrap(), Command::Help);
        assert!(Command::parse("/unknown", "relay_bot").is_err());
    }

    #[test]
    fn test_mentions_username() {
        let text = "hey @Relay_Bot https://youtu.be/x";
        let entities = [MessageEntity::new(MessageEntityKind::Mention, 4, 10)];
        assert!(mentions_username(text, &entities, "relay_bot"));
        assert!(mentions_username("@relay_bot", &[], "relay_bot"));
        assert!(!mentions_username("@other_bot link", &[], "relay_bot"));
    }
}

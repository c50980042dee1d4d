//! Telegram bot integration and handlers

pub mod bot;
pub mod handlers;
pub mod keyboard;
pub mod send;
pub mod session;
pub mod status;

// Re-exports for convenience
pub use bot::{create_bot, is_message_addressed_to_bot, setup_bot_commands, Command};
pub use handlers::{schema, HandlerDeps, HandlerError};

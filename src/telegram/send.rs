//! Sending a finished download to the chat.

use teloxide::prelude::*;
use teloxide::types::InputFile;
use teloxide::RequestError;

use crate::download::types::{DownloadResult, MediaKind};

/// Sends the file as the attachment type matching its media kind.
pub async fn send_inline(bot: &Bot, chat_id: ChatId, result: &DownloadResult) -> Result<(), RequestError> {
    let file = InputFile::file(result.local_path.clone()).file_name(result.file_name());
    let caption = result.title.clone().unwrap_or_default();

    match result.media_kind {
        MediaKind::Audio => {
            let mut req = bot.send_audio(chat_id, file);
            if let Some(title) = &result.title {
                req = req.title(title.clone());
            }
            req.await?;
        }
        MediaKind::Video => {
            bot.send_video(chat_id, file)
                .supports_streaming(true)
                .caption(caption)
                .await?;
        }
        MediaKind::Photo => {
            bot.send_photo(chat_id, file).caption(caption).await?;
        }
    }
    log::info!("✅ Sent {} ({} bytes) to chat {}", result.file_name(), result.size_bytes, chat_id);
    Ok(())
}

pub fn link_message(result: &DownloadResult, url: &str, caveat: &str) -> String {
    let name = result.title.clone().unwrap_or_else(|| result.file_name());
    format!(
        "📦 {}\n\nThe file is too large for Telegram, download it here:\n{}\n\n⚠️ {}",
        name, url, caveat
    )
}

/// Removes the delivered file right away instead of waiting for the sweep.
pub async fn discard(result: &DownloadResult) {
    match tokio::fs::remove_file(&result.local_path).await {
        Ok(()) => log::debug!("Removed delivered file {}", result.local_path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("Failed to remove {}: {}", result.local_path.display(), e),
    }
}

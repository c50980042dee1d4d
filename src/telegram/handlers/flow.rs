//! One request from accepted link to delivered file.

use teloxide::prelude::*;
use tokio::sync::mpsc;

use crate::download::platform::Platform;
use crate::download::types::DownloadRequest;
use crate::download::upload::Delivery;
use crate::telegram::send;
use crate::telegram::status::{follow_progress, RequestStatus, StatusMessage};

use super::types::HandlerDeps;

/// Runs `request` in the background so the dispatcher stays responsive.
pub fn spawn_request(bot: Bot, deps: HandlerDeps, chat_id: ChatId, platform: Platform, request: DownloadRequest) {
    tokio::spawn(async move {
        if let Err(e) = process_request(&bot, &deps, chat_id, platform, request).await {
            log::error!("Request in chat {} aborted: {}", chat_id, e);
        }
    });
}

/// Download, deliver, clean up. Every failure ends as one message in the chat.
pub async fn process_request(
    bot: &Bot,
    deps: &HandlerDeps,
    chat_id: ChatId,
    platform: Platform,
    request: DownloadRequest,
) -> Result<(), teloxide::RequestError> {
    let status = StatusMessage::send(bot, chat_id, &RequestStatus::Starting { platform }).await?;

    let (progress_tx, progress_rx) = mpsc::unbounded_channel();
    let progress_task = tokio::spawn(follow_progress(status.clone(), progress_rx));

    let outcome = deps.ctx.download(&request, progress_tx).await;
    // channel is closed once the download returns
    let _ = progress_task.await;

    let (result, _lease) = match outcome {
        Ok(done) => done,
        Err(e) => {
            log::warn!("Request {} in chat {} failed: {}", request.id, chat_id, e);
            status.edit_text(e.user_message()).await;
            return Ok(());
        }
    };

    let sending = if result.size_bytes > deps.ctx.settings.max_inline_size {
        RequestStatus::UploadingExternal {
            size_bytes: result.size_bytes,
        }
    } else {
        RequestStatus::Uploading
    };
    status.update(&sending).await;
    let delivery = deps.ctx.deliver(&result).await;

    let sent = match delivery {
        Ok(Delivery::Inline) => send::send_inline(bot, chat_id, &result).await.map_err(|e| {
            log::error!("Failed to send {} to chat {}: {}", result.file_name(), chat_id, e);
            "❌ Telegram rejected the file.\n\nPlease try again later.".to_string()
        }),
        Ok(Delivery::Link { url, caveat }) => bot
            .send_message(chat_id, send::link_message(&result, &url, caveat))
            .await
            .map(|_| ())
            .map_err(|e| {
                log::error!("Failed to send link to chat {}: {}", chat_id, e);
                "❌ Could not send the download link.\n\nPlease try again later.".to_string()
            }),
        Err(e) => {
            log::error!("Delivery of {} failed: {}", result.file_name(), e);
            Err(e.user_message())
        }
    };

    match sent {
        Ok(()) => status.delete().await,
        Err(text) => status.edit_text(text).await,
    }
    send::discard(&result).await;
    Ok(())
}

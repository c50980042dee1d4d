//! The single status message a request edits while it runs.

use teloxide::prelude::*;
use teloxide::types::MessageId;
use teloxide::{ApiError, RequestError};
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::core::config;
use crate::core::utils::{format_bytes, format_duration, render_progress_bar};
use crate::download::platform::Platform;
use crate::download::progress::{ProgressEvent, ProgressInfo};

/// What the status message currently says.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestStatus {
    Starting { platform: Platform },
    /// A later persona took over after the first one failed
    Retrying { persona: &'static str, index: usize, total: usize },
    Downloading(ProgressInfo),
    Processing,
    Uploading,
    /// Large file going to the external host
    UploadingExternal { size_bytes: u64 },
}

impl RequestStatus {
    pub fn to_message(&self) -> String {
        match self {
            RequestStatus::Starting { platform } => format!("⏳ Downloading from {}...", platform),
            RequestStatus::Retrying { persona, index, total } => {
                format!("🔄 Trying another way ({}/{}, {})...", index, total, persona)
            }
            RequestStatus::Downloading(info) => {
                let mut s = format!(
                    "⬇️ Downloading: {}%\n{}",
                    info.percent,
                    render_progress_bar(info.percent, config::download::PROGRESS_BAR_WIDTH)
                );
                if let Some(speed) = info.speed_mbs {
                    s.push_str(&format!("\n\n⚡ Speed: {:.1} MB/s", speed));
                }
                if let Some(eta) = info.eta_seconds {
                    s.push_str(&format!("\n⏱️ ETA: {}", format_duration(eta)));
                }
                if let (Some(current), Some(total)) = (info.current_size, info.total_size) {
                    s.push_str(&format!("\n📦 Size: {} / {}", format_bytes(current), format_bytes(total)));
                }
                s
            }
            RequestStatus::Processing => "🔄 Processing...".to_string(),
            RequestStatus::Uploading => "📤 Sending to Telegram...".to_string(),
            RequestStatus::UploadingExternal { size_bytes } => format!(
                "📤 The file is {}, too large for Telegram. Uploading to a file host...",
                format_bytes(*size_bytes)
            ),
        }
    }

    /// Status for a progress event; the first attempt is not worth a message.
    pub fn from_event(event: &ProgressEvent) -> Option<Self> {
        match event {
            ProgressEvent::Attempt { index: 1, .. } => None,
            ProgressEvent::Attempt { persona, index, total } => Some(RequestStatus::Retrying {
                persona: *persona,
                index: *index,
                total: *total,
            }),
            ProgressEvent::Downloading(info) => Some(RequestStatus::Downloading(info.clone())),
            ProgressEvent::Processing => Some(RequestStatus::Processing),
        }
    }
}

/// A message the bot keeps editing.
#[derive(Debug, Clone)]
pub struct StatusMessage {
    bot: Bot,
    chat_id: ChatId,
    message_id: MessageId,
}

impl StatusMessage {
    pub async fn send(bot: &Bot, chat_id: ChatId, status: &RequestStatus) -> Result<Self, RequestError> {
        let msg = bot.send_message(chat_id, status.to_message()).await?;
        Ok(Self {
            bot: bot.clone(),
            chat_id,
            message_id: msg.id,
        })
    }

    pub async fn update(&self, status: &RequestStatus) {
        self.edit_text(status.to_message()).await;
    }

    /// Best effort: an unchanged text is fine and flood control waits once.
    pub async fn edit_text(&self, text: String) {
        match self.bot.edit_message_text(self.chat_id, self.message_id, text.clone()).await {
            Ok(_) | Err(RequestError::Api(ApiError::MessageNotModified)) => {}
            Err(RequestError::RetryAfter(secs)) => {
                log::warn!("Status edit rate limited, retrying in {}s", secs.seconds());
                tokio::time::sleep(secs.duration()).await;
                if let Err(e) = self.bot.edit_message_text(self.chat_id, self.message_id, text).await {
                    log::warn!("Status edit failed after retry: {}", e);
                }
            }
            Err(e) => log::warn!("Failed to edit status message in chat {}: {}", self.chat_id, e),
        }
    }

    pub async fn delete(&self) {
        if let Err(e) = self.bot.delete_message(self.chat_id, self.message_id).await {
            log::debug!("Failed to delete status message: {}", e);
        }
    }
}

/// Mirrors progress events into `status` until the channel closes.
///
/// Download percentages are throttled; attempt and processing changes always go through.
pub async fn follow_progress(status: StatusMessage, mut rx: mpsc::UnboundedReceiver<ProgressEvent>) {
    let throttle = config::download::progress_throttle();
    let mut last_edit: Option<Instant> = None;
    let mut last_percent: Option<u8> = None;

    while let Some(event) = rx.recv().await {
        let Some(next) = RequestStatus::from_event(&event) else {
            continue;
        };

        if let RequestStatus::Downloading(info) = &next {
            let too_soon = last_edit.is_some_and(|at| at.elapsed() < throttle);
            if too_soon || last_percent == Some(info.percent) {
                continue;
            }
            last_percent = Some(info.percent);
        } else {
            last_percent = None;
        }

        status.update(&next).await;
        last_edit = Some(Instant::now());
    }
}

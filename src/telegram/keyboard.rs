//! Inline keyboards for the YouTube format/quality choice.

use strum::IntoEnumIterator;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::download::types::VideoQuality;

/// A decoded callback button press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    Audio,
    /// Asks for the quality keyboard
    Video,
    Quality(VideoQuality),
}

impl CallbackAction {
    /// Parses `audio`, `video` or `video_<height>`.
    pub fn parse(data: &str) -> Option<Self> {
        match data {
            "audio" => Some(CallbackAction::Audio),
            "video" => Some(CallbackAction::Video),
            other => other
                .strip_prefix("video_")
                .and_then(VideoQuality::parse)
                .map(CallbackAction::Quality),
        }
    }

    pub fn data(&self) -> String {
        match self {
            CallbackAction::Audio => "audio".to_string(),
            CallbackAction::Video => "video".to_string(),
            CallbackAction::Quality(q) => format!("video_{}", q.height()),
        }
    }
}

pub fn format_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback("🎵 Audio (MP3)", CallbackAction::Audio.data()),
        InlineKeyboardButton::callback("🎬 Video", CallbackAction::Video.data()),
    ]])
}

/// Two rows of two quality buttons.
pub fn quality_keyboard() -> InlineKeyboardMarkup {
    let buttons: Vec<InlineKeyboardButton> = VideoQuality::iter()
        .map(|q| InlineKeyboardButton::callback(q.to_string(), CallbackAction::Quality(q).data()))
        .collect();
    InlineKeyboardMarkup::new(buttons.chunks(2).map(<[_]>::to_vec).collect::<Vec<_>>())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_actions() {
        assert_eq!(CallbackAction::parse("audio"), Some(CallbackAction::Audio));
        assert_eq!(CallbackAction::parse("video"), Some(CallbackAction::Video));
        assert_eq!(
            CallbackAction::parse("video_1080"),
            Some(CallbackAction::Quality(VideoQuality::P1080))
        );
        assert_eq!(CallbackAction::parse("video_999"), None);
        assert_eq!(CallbackAction::parse("settings"), None);
    }

    #[test]
    fn test_action_data_parses_back() {
        for q in VideoQuality::iter() {
            let action = CallbackAction::Quality(q);
            assert_eq!(CallbackAction::parse(&action.data()), Some(action));
        }
    }

    #[test]
    fn test_quality_keyboard_layout() {
        let keyboard = quality_keyboard();
        assert_eq!(keyboard.inline_keyboard.len(), 2);
        assert!(keyboard.inline_keyboard.iter().all(|row| row.len() == 2));
        assert_eq!(keyboard.inline_keyboard[0][0].text, "360p");
    }
}

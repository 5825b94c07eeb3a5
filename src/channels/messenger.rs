//! Outbound messaging seam.

use async_trait::async_trait;

use super::update::ChatId;
use crate::error::ChannelError;

/// A selectable reply button attached to a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyOption {
    /// Button label shown to the user.
    pub label: String,
    /// Payload delivered back when the button is pressed.
    pub data: String,
}

impl ReplyOption {
    pub fn new(label: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            data: data.into(),
        }
    }
}

/// Sends replies to the chat platform.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Send `text` to `chat_id`, optionally with one button per option.
    async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        options: &[ReplyOption],
    ) -> Result<(), ChannelError>;

    /// Acknowledge a button press so the client stops its loading state.
    async fn answer_callback(&self, callback_id: &str) -> Result<(), ChannelError>;
}

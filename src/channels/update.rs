//! Telegram Bot API update payloads: only the fields the dialog reads.

use serde::Deserialize;

use crate::store::UserId;

/// Chat identifier, the target of outgoing messages.
pub type ChatId = i64;

/// One webhook delivery.
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    #[serde(default)]
    pub from: Option<User>,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: UserId,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: ChatId,
}

/// An inline keyboard button press.
#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub data: Option<String>,
}

impl CallbackQuery {
    /// Chat to reply in. Falls back to the user's private chat.
    pub fn chat_id(&self) -> ChatId {
        self.message
            .as_ref()
            .map(|m| m.chat.id)
            .unwrap_or(self.from.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_text_message() {
        let update: Update = serde_json::from_value(serde_json::json!({
            "update_id": 10,
            "message": {
                "message_id": 1,
                "from": {"id": 42, "is_bot": false, "first_name": "Alice", "username": "alice"},
                "chat": {"id": 42, "type": "private"},
                "date": 1700000000,
                "text": "hello"
            }
        }))
        .unwrap();

        let message = update.message.unwrap();
        assert_eq!(message.from.unwrap().id, 42);
        assert_eq!(message.text.as_deref(), Some("hello"));
        assert!(update.callback_query.is_none());
    }

    #[test]
    fn parses_callback_query() {
        let update: Update = serde_json::from_value(serde_json::json!({
            "update_id": 11,
            "callback_query": {
                "id": "cb-1",
                "from": {"id": 42, "is_bot": false, "first_name": "Alice"},
                "message": {"message_id": 5, "chat": {"id": -100}, "date": 1700000000},
                "chat_instance": "x",
                "data": "register"
            }
        }))
        .unwrap();

        let query = update.callback_query.unwrap();
        assert_eq!(query.data.as_deref(), Some("register"));
        assert_eq!(query.chat_id(), -100);
    }

    #[test]
    fn callback_without_message_replies_to_user() {
        let update: Update = serde_json::from_value(serde_json::json!({
            "update_id": 12,
            "callback_query": {"id": "cb-2", "from": {"id": 7}, "data": "login"}
        }))
        .unwrap();
        assert_eq!(update.callback_query.unwrap().chat_id(), 7);
    }

    #[test]
    fn non_text_message_has_no_text() {
        let update: Update = serde_json::from_value(serde_json::json!({
            "update_id": 13,
            "message": {"message_id": 2, "chat": {"id": 1}, "sticker": {"file_id": "abc"}}
        }))
        .unwrap();
        assert!(update.message.unwrap().text.is_none());
    }
}

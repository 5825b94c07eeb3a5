//! Telegram channel: Bot API client for webhook-mode bots.
//!
//! Updates arrive through the webhook route; this client only talks
//! outbound: replies, callback acknowledgements, and webhook registration.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::channels::{ChatId, Messenger, ReplyOption};
use crate::error::ChannelError;

/// Default Bot API base URL.
pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Telegram Bot API client.
pub struct TelegramClient {
    bot_token: SecretString,
    api_base: String,
    client: reqwest::Client,
}

impl TelegramClient {
    pub fn new(bot_token: SecretString) -> Self {
        Self {
            bot_token,
            api_base: TELEGRAM_API_BASE.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Point the client at a different Bot API server.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn api_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{method}",
            self.api_base,
            self.bot_token.expose_secret()
        )
    }

    /// POST a JSON body to a Bot API method and return the `result` field.
    async fn call(
        &self,
        method: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, ChannelError> {
        let resp = self
            .client
            .post(self.api_url(method))
            .json(body)
            .send()
            .await
            // The URL embeds the bot token.
            .map_err(|e| send_failed(format!("{method}: {}", e.without_url())))?;

        let status = resp.status();
        if !status.is_success() {
            let err = resp.text().await.unwrap_or_default();
            return Err(send_failed(format!("{method} returned {status}: {err}")));
        }

        let data: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| send_failed(format!("{method}: invalid response: {}", e.without_url())))?;

        if data.get("ok").and_then(serde_json::Value::as_bool) != Some(true) {
            let description = data
                .get("description")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("unknown error");
            return Err(send_failed(format!("{method} rejected: {description}")));
        }

        Ok(data
            .get("result")
            .cloned()
            .unwrap_or(serde_json::Value::Null))
    }

    /// Verify the token. Returns the bot's username.
    pub async fn get_me(&self) -> Result<String, ChannelError> {
        let result = self
            .call("getMe", &serde_json::json!({}))
            .await
            .map_err(|e| ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: e.to_string(),
            })?;

        Ok(result
            .get("username")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_string())
    }

    /// Register `url` as the delivery endpoint for updates.
    pub async fn set_webhook(&self, url: &str) -> Result<(), ChannelError> {
        self.call(
            "setWebhook",
            &serde_json::json!({
                "url": url,
                "allowed_updates": ["message", "callback_query"]
            }),
        )
        .await
        .map_err(|e| ChannelError::StartupFailed {
            name: "telegram".into(),
            reason: e.to_string(),
        })?;

        tracing::info!(url, "Telegram webhook registered");
        Ok(())
    }
}

#[async_trait]
impl Messenger for TelegramClient {
    async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        options: &[ReplyOption],
    ) -> Result<(), ChannelError> {
        let mut body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        });
        if !options.is_empty() {
            body["reply_markup"] = inline_keyboard(options);
        }

        self.call("sendMessage", &body).await?;
        tracing::debug!(chat_id, "Telegram message sent");
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str) -> Result<(), ChannelError> {
        self.call(
            "answerCallbackQuery",
            &serde_json::json!({ "callback_query_id": callback_id }),
        )
        .await?;
        Ok(())
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn send_failed(reason: String) -> ChannelError {
    ChannelError::SendFailed {
        name: "telegram".into(),
        reason,
    }
}

/// One button per row, in order.
fn inline_keyboard(options: &[ReplyOption]) -> serde_json::Value {
    let rows: Vec<serde_json::Value> = options
        .iter()
        .map(|o| serde_json::json!([{ "text": o.label, "callback_data": o.data }]))
        .collect();
    serde_json::json!({ "inline_keyboard": rows })
}

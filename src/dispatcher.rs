//! Dialog dispatcher: turns each webhook update into exactly one reply.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::channels::{ChatId, Messenger, ReplyOption, Update};
use crate::error::Result;
use crate::registration::{Prompt, RegistrationMachine};
use crate::store::UserId;

/// Callback payload of the Register button.
pub const REGISTER: &str = "register";
/// Callback payload of the Login button.
pub const LOGIN: &str = "login";

/// What an update asks the bot to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundKind {
    /// `/start`: show the menu.
    Start,
    /// `/cancel`: abort the current registration.
    Cancel,
    /// Register button.
    Register { callback_id: String },
    /// Login button.
    Login { callback_id: String },
    /// A button this bot does not know.
    UnknownButton { callback_id: String },
    /// Free text, fed to the registration dialog.
    Text(String),
}

/// A classified update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    pub user_id: UserId,
    pub chat_id: ChatId,
    pub kind: InboundKind,
}

/// Classify an update. `None` for updates the bot ignores
/// (non-text messages, unknown commands, updates without a sender).
pub fn classify(update: &Update) -> Option<Inbound> {
    if let Some(query) = &update.callback_query {
        let callback_id = query.id.clone();
        let kind = match query.data.as_deref() {
            Some(REGISTER) => InboundKind::Register { callback_id },
            Some(LOGIN) => InboundKind::Login { callback_id },
            _ => InboundKind::UnknownButton { callback_id },
        };
        return Some(Inbound {
            user_id: query.from.id,
            chat_id: query.chat_id(),
            kind,
        });
    }

    let message = update.message.as_ref()?;
    let user_id = message.from.as_ref()?.id;
    let text = message.text.as_deref()?;

    let kind = match text.strip_prefix('/') {
        Some(rest) => match command_name(rest) {
            "start" => InboundKind::Start,
            "cancel" => InboundKind::Cancel,
            _ => return None,
        },
        None => InboundKind::Text(text.to_string()),
    };

    Some(Inbound {
        user_id,
        chat_id: message.chat.id,
        kind,
    })
}

/// `start` for `start@SignupBot payload`.
fn command_name(rest: &str) -> &str {
    let first = rest.split_whitespace().next().unwrap_or_default();
    first.split('@').next().unwrap_or(first)
}

/// Routes inbound updates to the registration machine and replies.
pub struct Dispatcher {
    machine: RegistrationMachine,
    messenger: Arc<dyn Messenger>,
}

impl Dispatcher {
    pub fn new(machine: RegistrationMachine, messenger: Arc<dyn Messenger>) -> Self {
        Self { machine, messenger }
    }

    pub fn machine(&self) -> &RegistrationMachine {
        &self.machine
    }

    /// Handle one update. Errors are send failures only; dialog outcomes
    /// (taken usernames, storage failures) are replies, not errors.
    pub async fn dispatch(&self, update: &Update) -> Result<()> {
        let Some(inbound) = classify(update) else {
            debug!(update_id = update.update_id, "Ignoring update");
            return Ok(());
        };

        let Inbound {
            user_id,
            chat_id,
            kind,
        } = inbound;

        match kind {
            InboundKind::Start => {
                let menu = [
                    ReplyOption::new("Register", REGISTER),
                    ReplyOption::new("Login", LOGIN),
                ];
                self.reply(chat_id, Prompt::Welcome, &menu).await
            }
            InboundKind::Cancel => {
                let prompt = self.machine.cancel(user_id).await;
                self.reply(chat_id, prompt, &[]).await
            }
            InboundKind::Register { callback_id } => {
                self.acknowledge(&callback_id).await;
                let prompt = self.machine.begin(user_id).await;
                self.reply(chat_id, prompt, &[]).await
            }
            InboundKind::Login { callback_id } => {
                self.acknowledge(&callback_id).await;
                self.reply(chat_id, Prompt::LoginUnavailable, &[]).await
            }
            InboundKind::UnknownButton { callback_id } => {
                self.acknowledge(&callback_id).await;
                Ok(())
            }
            InboundKind::Text(text) => {
                let prompt = self.machine.handle_text(user_id, &text).await;
                self.reply(chat_id, prompt, &[]).await
            }
        }
    }

    async fn reply(&self, chat_id: ChatId, prompt: Prompt, options: &[ReplyOption]) -> Result<()> {
        self.messenger
            .send_message(chat_id, prompt.text(), options)
            .await?;
        Ok(())
    }

    async fn acknowledge(&self, callback_id: &str) {
        if let Err(e) = self.messenger.answer_callback(callback_id).await {
            warn!(callback_id, error = %e, "Failed to answer callback query");
        }
    }
}

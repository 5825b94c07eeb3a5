//! Chat platform I/O.

pub mod messenger;
pub mod telegram;
pub mod update;

pub use messenger::{Messenger, ReplyOption};
pub use telegram::TelegramClient;
pub use update::{CallbackQuery, ChatId, Message, Update, User};

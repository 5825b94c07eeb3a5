//! Signup Bot: webhook-driven Telegram registration dialog.

pub mod channels;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod registration;
pub mod store;
pub mod webhook;

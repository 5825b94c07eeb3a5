//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;

use crate::error::ConfigError;

/// Default HTTP port for the webhook listener.
pub const DEFAULT_PORT: u16 = 5000;

/// Where the user store lives, parsed from the `STORE_CREDENTIALS` JSON blob.
#[derive(Debug, Clone)]
pub enum StoreCredentials {
    /// Remote libSQL database (`{"url": "...", "auth_token": "..."}`).
    Remote {
        url: String,
        auth_token: SecretString,
    },
    /// Local database file (`{"path": "./data/users.db"}`).
    Local { path: PathBuf },
}

/// Wire shape of `STORE_CREDENTIALS`.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawCredentials {
    Remote { url: String, auth_token: String },
    Local { path: PathBuf },
}

impl StoreCredentials {
    /// Parse the credential blob.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let raw: RawCredentials =
            serde_json::from_str(raw).map_err(|e| ConfigError::Credentials(e.to_string()))?;
        Ok(match raw {
            RawCredentials::Remote { url, auth_token } => Self::Remote {
                url,
                auth_token: SecretString::from(auth_token),
            },
            RawCredentials::Local { path } => Self::Local { path },
        })
    }

    /// Human-readable location for startup logs (never includes the token).
    pub fn describe(&self) -> String {
        match self {
            Self::Remote { url, .. } => url.clone(),
            Self::Local { path } => path.display().to_string(),
        }
    }
}

/// Bot configuration.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Telegram bot token.
    pub bot_token: SecretString,
    /// Public URL the chat platform posts updates to.
    pub webhook_url: String,
    /// User store location and credentials.
    pub store: StoreCredentials,
    /// Port the webhook listener binds to.
    pub port: u16,
    /// Upper bound on any single storage call.
    pub store_timeout: Duration,
    /// Sessions untouched for this long are swept. `None` disables the sweep.
    pub session_idle_timeout: Option<Duration>,
}

impl BotConfig {
    /// Build config from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let require = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
        };

        let store = StoreCredentials::parse(&require("STORE_CREDENTIALS")?)?;
        let bot_token = SecretString::from(require("BOT_TOKEN")?);
        let webhook_url = require("WEBHOOK_URL")?;

        let port = parse_or("PORT", lookup("PORT"), DEFAULT_PORT)?;
        let timeout_secs: u64 = parse_or(
            "SIGNUP_BOT_STORE_TIMEOUT_SECS",
            lookup("SIGNUP_BOT_STORE_TIMEOUT_SECS"),
            5,
        )?;
        let idle_minutes: u64 = parse_or(
            "SIGNUP_BOT_SESSION_IDLE_MIN",
            lookup("SIGNUP_BOT_SESSION_IDLE_MIN"),
            60,
        )?;

        if timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "SIGNUP_BOT_STORE_TIMEOUT_SECS".into(),
                message: "must be at least 1".into(),
            });
        }
        let idle_secs = idle_minutes
            .checked_mul(60)
            .ok_or_else(|| ConfigError::InvalidValue {
                key: "SIGNUP_BOT_SESSION_IDLE_MIN".into(),
                message: "too large".into(),
            })?;

        Ok(Self {
            bot_token,
            webhook_url,
            store,
            port,
            store_timeout: Duration::from_secs(timeout_secs),
            session_idle_timeout: (idle_secs > 0).then(|| Duration::from_secs(idle_secs)),
        })
    }
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            }),
        None => Ok(default),
    }
}

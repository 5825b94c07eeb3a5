//! Registration state machine: which step a user is on and how input moves it.
//!
//! `transition` is pure: it never touches storage. The caller performs the
//! username lookup up front and the final write afterwards.

use std::time::Duration;

use chrono::{DateTime, Utc};

use super::prompts::Prompt;
use crate::store::UserRecord;

/// Literal that opts out of a referral code (compared case-insensitively).
pub const SKIP_TOKEN: &str = "skip";

/// The dialog steps, each carrying the answers collected so far.
///
/// Progresses linearly: Username → Password → Referral → (persisted).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Username,
    Password { username: String },
    Referral { username: String, password: String },
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Username => "username",
            Self::Password { .. } => "password",
            Self::Referral { .. } => "referral",
        }
    }

    /// The prompt that asks for this step's input.
    pub fn prompt(&self) -> Prompt {
        match self {
            Self::Username => Prompt::AskUsername,
            Self::Password { .. } => Prompt::AskPassword,
            Self::Referral { .. } => Prompt::AskReferral,
        }
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A user's in-progress registration.
#[derive(Debug, Clone)]
pub struct Session {
    pub step: Step,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            step: Step::Username,
            started_at: now,
            updated_at: now,
        }
    }

    /// Move to `step` and refresh the activity timestamp.
    pub fn advance(&mut self, step: Step) {
        self.step = step;
        self.touch();
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Whether the session has seen no activity for longer than `timeout`.
    pub fn is_idle(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        match chrono::Duration::from_std(timeout) {
            Ok(timeout) => now - self.updated_at > timeout,
            Err(_) => false,
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of feeding one message into a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Input rejected; stay on the current step and reply.
    Stay(Prompt),
    /// Input accepted; move to `step` and reply.
    Advance { step: Step, prompt: Prompt },
    /// Final answer accepted; the record must be persisted.
    Complete(UserRecord),
}

/// Apply `input` to `step`.
///
/// `username_taken` is only consulted on the username step.
pub fn transition(step: &Step, input: &str, username_taken: bool) -> Transition {
    match step {
        Step::Username if input.trim().is_empty() => Transition::Stay(Prompt::AskUsername),
        Step::Username if username_taken => Transition::Stay(Prompt::UsernameTaken),
        Step::Username => Transition::Advance {
            step: Step::Password {
                username: input.to_string(),
            },
            prompt: Prompt::AskPassword,
        },
        Step::Password { username } => Transition::Advance {
            step: Step::Referral {
                username: username.clone(),
                password: input.to_string(),
            },
            prompt: Prompt::AskReferral,
        },
        Step::Referral { username, password } => Transition::Complete(UserRecord {
            username: username.clone(),
            password: password.clone(),
            referral: parse_referral(input),
        }),
    }
}

/// `None` for any case variant of the skip token, otherwise the input verbatim.
pub fn parse_referral(input: &str) -> Option<String> {
    if input.to_lowercase() == SKIP_TOKEN {
        None
    } else {
        Some(input.to_string())
    }
}

//! RegistrationMachine: applies dialog transitions against the session
//! store and the user store.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use super::prompts::Prompt;
use super::sessions::SessionStore;
use super::state::{Step, Transition, transition};
use crate::error::DatabaseError;
use crate::store::{UserId, UserStore};

/// Drives each user's registration one message at a time.
///
/// A user's session lock is held for the whole step, storage calls
/// included, so duplicate deliveries for one user apply in sequence.
#[derive(Clone)]
pub struct RegistrationMachine {
    sessions: Arc<SessionStore>,
    users: Arc<dyn UserStore>,
    store_timeout: Duration,
}

impl RegistrationMachine {
    pub fn new(
        sessions: Arc<SessionStore>,
        users: Arc<dyn UserStore>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            sessions,
            users,
            store_timeout,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Begin registration. Any dialog already in progress starts over.
    pub async fn begin(&self, user_id: UserId) -> Prompt {
        let mut guard = self.sessions.lock(user_id).await;
        if let Some(previous) = guard.get() {
            info!(user_id, step = %previous.step, "Restarting registration");
        } else {
            info!(user_id, "Registration started");
        }
        guard.create();
        Prompt::AskUsername
    }

    /// Abort the user's registration, if one is in progress.
    pub async fn cancel(&self, user_id: UserId) -> Prompt {
        match self.sessions.delete(user_id).await {
            Some(session) => {
                info!(user_id, step = %session.step, "Registration cancelled");
                Prompt::Cancelled
            }
            None => Prompt::StartFirst,
        }
    }

    /// Feed one text message into the user's current step.
    pub async fn handle_text(&self, user_id: UserId, text: &str) -> Prompt {
        let mut guard = self.sessions.lock(user_id).await;
        let Some(session) = guard.get() else {
            return Prompt::StartFirst;
        };
        let step = session.step.clone();

        let username_taken = match step {
            Step::Username if !text.trim().is_empty() => {
                match self
                    .timed("username_exists", self.users.username_exists(text))
                    .await
                {
                    Ok(taken) => taken,
                    Err(e) => {
                        warn!(user_id, error = %e, retryable = e.is_retryable(), "Username lookup failed");
                        guard.touch();
                        return Prompt::LookupFailed;
                    }
                }
            }
            _ => false,
        };

        match transition(&step, text, username_taken) {
            Transition::Stay(prompt) => {
                guard.touch();
                prompt
            }
            Transition::Advance { step: next, prompt } => {
                info!(user_id, from = %step, to = %next, "Registration step advanced");
                guard.update(next);
                prompt
            }
            Transition::Complete(record) => {
                match self
                    .timed("put_user", self.users.put_user(user_id, &record))
                    .await
                {
                    Ok(()) => {
                        guard.delete();
                        info!(user_id, username = %record.username, "Registration complete");
                        Prompt::Complete
                    }
                    Err(e) if e.is_username_conflict() => {
                        warn!(user_id, username = %record.username, "Username claimed before commit");
                        guard.update(Step::Username);
                        Prompt::UsernameTaken
                    }
                    Err(e) => {
                        error!(user_id, error = %e, retryable = e.is_retryable(), "Failed to persist registration");
                        guard.touch();
                        Prompt::SaveFailed
                    }
                }
            }
        }
    }

    /// Bound a storage call by the configured timeout.
    async fn timed<T, F>(&self, operation: &'static str, call: F) -> Result<T, DatabaseError>
    where
        F: Future<Output = Result<T, DatabaseError>>,
    {
        match tokio::time::timeout(self.store_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(DatabaseError::Timeout {
                operation,
                timeout: self.store_timeout,
            }),
        }
    }
}

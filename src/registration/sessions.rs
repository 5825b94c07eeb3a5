//! Session store: in-flight registrations keyed by user, one lock per user.
//!
//! Every read-modify-write goes through a [`SessionGuard`], which holds that
//! user's lock until dropped. Different users never contend. Sessions live
//! only as long as the process.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

use super::state::{Session, Step};
use crate::store::UserId;

type Slot = Arc<Mutex<Option<Session>>>;

/// Per-user session map.
#[derive(Default)]
pub struct SessionStore {
    slots: DashMap<UserId, Slot>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock `user_id`'s slot, waiting for any other task working on that user.
    pub async fn lock(&self, user_id: UserId) -> SessionGuard<'_> {
        let slot = Arc::clone(self.slots.entry(user_id).or_default().value());
        let guard = slot.lock_owned().await;
        SessionGuard {
            store: self,
            user_id,
            guard: Some(guard),
        }
    }

    /// Snapshot of the user's session, if any.
    pub async fn get(&self, user_id: UserId) -> Option<Session> {
        self.lock(user_id).await.get().cloned()
    }

    /// Start a fresh session at the username step, replacing any existing one.
    pub async fn create(&self, user_id: UserId) -> Session {
        self.lock(user_id).await.create().clone()
    }

    /// Move an existing session to `step`. No-op if the user has no session.
    pub async fn update(&self, user_id: UserId, step: Step) {
        self.lock(user_id).await.update(step);
    }

    /// Discard the user's session, returning it if one existed.
    pub async fn delete(&self, user_id: UserId) -> Option<Session> {
        self.lock(user_id).await.delete()
    }

    /// Drop sessions idle for longer than `timeout`. Returns how many were removed.
    ///
    /// Slots that are currently locked are skipped; they are in use.
    pub fn sweep_idle(&self, timeout: Duration) -> usize {
        let now = Utc::now();
        let keys: Vec<UserId> = self.slots.iter().map(|e| *e.key()).collect();
        let mut expired = 0;

        for user_id in keys {
            let Some(slot) = self.slots.get(&user_id).map(|e| Arc::clone(e.value())) else {
                continue;
            };
            if let Ok(mut session) = slot.try_lock() {
                if session.as_ref().is_some_and(|s| s.is_idle(now, timeout)) {
                    *session = None;
                    expired += 1;
                    debug!(user_id, "Idle session expired");
                }
            }
            drop(slot);
            self.prune(user_id);
        }

        expired
    }

    /// Remove the slot for `user_id` if it is empty and nobody else holds it.
    fn prune(&self, user_id: UserId) {
        self.slots.remove_if(&user_id, |_, slot| {
            Arc::strong_count(slot) == 1 && slot.try_lock().is_ok_and(|s| s.is_none())
        });
    }
}

/// Exclusive access to one user's session.
pub struct SessionGuard<'a> {
    store: &'a SessionStore,
    user_id: UserId,
    guard: Option<OwnedMutexGuard<Option<Session>>>,
}

impl SessionGuard<'_> {
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn get(&self) -> Option<&Session> {
        self.guard.as_ref().and_then(|g| g.as_ref())
    }

    /// Start over at the username step.
    pub fn create(&mut self) -> &Session {
        self.slot().insert(Session::new())
    }

    pub fn update(&mut self, step: Step) {
        if let Some(session) = self.slot().as_mut() {
            session.advance(step);
        }
    }

    /// Refresh the activity timestamp without changing the step.
    pub fn touch(&mut self) {
        if let Some(session) = self.slot().as_mut() {
            session.touch();
        }
    }

    pub fn delete(&mut self) -> Option<Session> {
        self.slot().take()
    }

    fn slot(&mut self) -> &mut Option<Session> {
        // The guard is only taken in Drop.
        match self.guard.as_mut() {
            Some(guard) => guard,
            None => unreachable!("session guard used after release"),
        }
    }
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        let empty = self.get().is_none();
        drop(self.guard.take());
        if empty {
            self.store.prune(self.user_id);
        }
    }
}

/// Spawn a background task that sweeps idle sessions every minute.
pub fn spawn_sweep_task(
    sessions: Arc<SessionStore>,
    idle_timeout: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            let expired = sessions.sweep_idle(idle_timeout);
            if expired > 0 {
                info!(expired, "Swept idle registration sessions");
            }
        }
    })
}

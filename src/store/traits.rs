//! `UserStore` trait: the durable side of registration.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::DatabaseError;

/// Chat-platform user identifier. Assigned externally, unique per user.
pub type UserId = i64;

/// The persisted outcome of a completed registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub username: String,
    pub password: String,
    pub referral: Option<String>,
}

/// Backend-agnostic user storage.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Whether any stored record already uses `username`.
    async fn username_exists(&self, username: &str) -> Result<bool, DatabaseError>;

    /// Upsert the record for `user_id`. Overwrites an existing record.
    ///
    /// Returns `DatabaseError::Constraint` if another user already holds
    /// the same username.
    async fn put_user(&self, user_id: UserId, record: &UserRecord) -> Result<(), DatabaseError>;

    /// Fetch the record for `user_id`, if any.
    async fn get_user(&self, user_id: UserId) -> Result<Option<UserRecord>, DatabaseError>;

    /// Number of stored records.
    async fn count_users(&self) -> Result<u64, DatabaseError>;
}

//! libSQL backend: async `UserStore` implementation.
//!
//! Supports local file, in-memory, and remote (`libsql://`) databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use libsql::{Connection, Database as LibSqlDatabase, params};
use secrecy::ExposeSecret;
use tracing::{debug, info};

use crate::config::StoreCredentials;
use crate::error::DatabaseError;
use crate::store::migrations;
use crate::store::traits::{UserId, UserRecord, UserStore};

/// libSQL user store.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlUserStore {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlUserStore {
    /// Open the store described by `credentials` and run migrations.
    pub async fn open(credentials: &StoreCredentials) -> Result<Self, DatabaseError> {
        match credentials {
            StoreCredentials::Local { path } => Self::new_local(path).await,
            StoreCredentials::Remote { url, auth_token } => {
                Self::new_remote(url, auth_token.expose_secret()).await
            }
        }
    }

    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let store = Self::from_database(db).await?;
        info!(path = %path.display(), "User store opened");
        Ok(store)
    }

    /// Connect to a remote libSQL database and run migrations.
    pub async fn new_remote(url: &str, auth_token: &str) -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_remote(url.to_string(), auth_token.to_string())
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to connect to {url}: {e}")))?;

        let store = Self::from_database(db).await?;
        info!(url, "User store connected");
        Ok(store)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;
        Self::from_database(db).await
    }

    async fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;
        migrations::run_migrations(&conn).await?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

/// Map a libsql write error, singling out unique-index violations.
fn write_error(op: &str, e: libsql::Error) -> DatabaseError {
    let msg = e.to_string();
    if msg.contains("UNIQUE constraint failed") {
        DatabaseError::Constraint(msg)
    } else {
        DatabaseError::Query(format!("{op}: {msg}"))
    }
}

/// Convert `Option<&str>` to libsql Value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

#[async_trait]
impl UserStore for LibSqlUserStore {
    async fn username_exists(&self, username: &str) -> Result<bool, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT COUNT(*) FROM users WHERE username = ?1",
                params![username],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("username_exists: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let count: i64 = row
                    .get(0)
                    .map_err(|e| DatabaseError::Query(format!("username_exists row: {e}")))?;
                Ok(count > 0)
            }
            Ok(None) => Ok(false),
            Err(e) => Err(DatabaseError::Query(format!("username_exists: {e}"))),
        }
    }

    async fn put_user(&self, user_id: UserId, record: &UserRecord) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();
        self.conn()
            .execute(
                "INSERT INTO users (user_id, username, password, referral, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)
                 ON CONFLICT (user_id) DO UPDATE SET
                    username = ?2, password = ?3, referral = ?4, updated_at = ?5",
                params![
                    user_id,
                    record.username.as_str(),
                    record.password.as_str(),
                    opt_text(record.referral.as_deref()),
                    now,
                ],
            )
            .await
            .map_err(|e| write_error("put_user", e))?;

        debug!(user_id, username = %record.username, "User record written");
        Ok(())
    }

    async fn get_user(&self, user_id: UserId) -> Result<Option<UserRecord>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT username, password, referral FROM users WHERE user_id = ?1",
                params![user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_user: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let parse = |e: libsql::Error| DatabaseError::Query(format!("get_user row: {e}"));
                Ok(Some(UserRecord {
                    username: row.get(0).map_err(parse)?,
                    password: row.get(1).map_err(parse)?,
                    referral: row.get(2).ok(),
                }))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_user: {e}"))),
        }
    }

    async fn count_users(&self) -> Result<u64, DatabaseError> {
        let mut rows = self
            .conn()
            .query("SELECT COUNT(*) FROM users", ())
            .await
            .map_err(|e| DatabaseError::Query(format!("count_users: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let count: i64 = row
                    .get(0)
                    .map_err(|e| DatabaseError::Query(format!("count_users row: {e}")))?;
                u64::try_from(count)
                    .map_err(|e| DatabaseError::Query(format!("count_users: {e}")))
            }
            Ok(None) => Ok(0),
            Err(e) => Err(DatabaseError::Query(format!("count_users: {e}"))),
        }
    }
}

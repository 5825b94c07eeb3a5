//! Persistence layer: libSQL-backed storage for registered users.

pub mod libsql_backend;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlUserStore;
pub use traits::{UserId, UserRecord, UserStore};

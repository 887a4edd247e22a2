//! SQLite storage backend for the warden authentication core.
//!
//! Implements the `warden-core` repository traits over an sqlx
//! [`SqlitePool`](sqlx::SqlitePool). Timestamps are stored as integer unix
//! seconds; the lockout counter transition runs as a single conditional
//! `UPDATE` so concurrent failed logins never lose increments.

pub mod migrations;
pub mod repositories;

pub use repositories::{SqliteAccountRepository, SqliteAttemptRepository, SqliteRepositoryProvider};

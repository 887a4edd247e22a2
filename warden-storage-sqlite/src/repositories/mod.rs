//! Repository implementations for SQLite storage

pub mod account;
pub mod attempt;

pub use account::SqliteAccountRepository;
pub use attempt::SqliteAttemptRepository;

use async_trait::async_trait;
use sqlx::SqlitePool;
use std::sync::Arc;

use warden_core::{Error, error::StorageError, repositories::RepositoryProvider};

use crate::migrations::SCHEMA;

/// Repository provider implementation for SQLite
pub struct SqliteRepositoryProvider {
    pool: SqlitePool,
    accounts: Arc<SqliteAccountRepository>,
    attempts: Arc<SqliteAttemptRepository>,
}

impl SqliteRepositoryProvider {
    pub fn new(pool: SqlitePool) -> Self {
        let accounts = Arc::new(SqliteAccountRepository::new(pool.clone()));
        let attempts = Arc::new(SqliteAttemptRepository::new(pool.clone()));

        Self {
            pool,
            accounts,
            attempts,
        }
    }

    /// Connect to a SQLite database by URL and build a provider over it.
    pub async fn connect(url: &str) -> Result<Self, Error> {
        let pool = SqlitePool::connect(url).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to connect to SQLite database");
            Error::Storage(StorageError::Connection(e.to_string()))
        })?;

        Ok(Self::new(pool))
    }
}

#[async_trait]
impl RepositoryProvider for SqliteRepositoryProvider {
    type Accounts = SqliteAccountRepository;
    type Attempts = SqliteAttemptRepository;

    fn accounts(&self) -> Arc<Self::Accounts> {
        self.accounts.clone()
    }

    fn attempts(&self) -> Arc<Self::Attempts> {
        self.attempts.clone()
    }

    async fn migrate(&self) -> Result<(), Error> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await.map_err(|e| {
                tracing::error!(error = %e, "Failed to run migration statement");
                Error::Storage(StorageError::Migration(e.to_string()))
            })?;
        }

        Ok(())
    }

    async fn health_check(&self) -> Result<(), Error> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;
        Ok(())
    }
}

//! SQLite implementation of the credential-store repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::str::FromStr;

use warden_core::{
    Error,
    account::{Account, AccountId, NewAccount, Role},
    error::StorageError,
    repositories::AccountRepository,
};

pub struct SqliteAccountRepository {
    pool: SqlitePool,
}

impl SqliteAccountRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Internal struct for query results
#[derive(Debug, sqlx::FromRow)]
struct SqliteAccount {
    id: String,
    email: String,
    phone: String,
    first_name: String,
    last_name: String,
    password_hash: String,
    role: String,
    has_access: bool,
    access_changed_by: Option<String>,
    access_changed_at: Option<i64>,
    failed_login_attempts: i64,
    lock_until: Option<i64>,
    last_login_at: Option<i64>,
    created_at: i64,
    updated_at: i64,
}

fn timestamp(ts: i64) -> Result<DateTime<Utc>, Error> {
    DateTime::from_timestamp(ts, 0)
        .ok_or_else(|| Error::Storage(StorageError::Database(format!("Invalid timestamp: {ts}"))))
}

impl TryFrom<SqliteAccount> for Account {
    type Error = Error;

    fn try_from(row: SqliteAccount) -> Result<Self, Error> {
        // A role outside the closed set is corrupted data; surfacing it as
        // a validation error lets the verifier fail closed.
        let role = Role::from_str(&row.role)?;

        Ok(Account {
            id: AccountId::new(&row.id),
            email: row.email,
            phone: row.phone,
            first_name: row.first_name,
            last_name: row.last_name,
            password_hash: row.password_hash,
            role,
            has_access: row.has_access,
            access_changed_by: row.access_changed_by.map(|id| AccountId::new(&id)),
            access_changed_at: row.access_changed_at.map(timestamp).transpose()?,
            failed_login_attempts: row.failed_login_attempts.max(0) as u32,
            lock_until: row.lock_until.map(timestamp).transpose()?,
            last_login_at: row.last_login_at.map(timestamp).transpose()?,
            created_at: timestamp(row.created_at)?,
            updated_at: timestamp(row.updated_at)?,
        })
    }
}

#[async_trait]
impl AccountRepository for SqliteAccountRepository {
    async fn create(&self, account: NewAccount) -> Result<Account, Error> {
        let now = Utc::now().timestamp();

        let row = sqlx::query_as::<_, SqliteAccount>(
            r#"
            INSERT INTO accounts (id, email, phone, first_name, last_name, password_hash, role,
                created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            RETURNING *
            "#,
        )
        .bind(account.id.as_str())
        .bind(&account.email)
        .bind(&account.phone)
        .bind(&account.first_name)
        .bind(&account.last_name)
        .bind(&account.password_hash)
        .bind(account.role.as_str())
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if e.as_database_error()
                .is_some_and(|db| db.is_unique_violation())
            {
                Error::Storage(StorageError::Constraint(
                    "Email or phone already registered".to_string(),
                ))
            } else {
                Error::Storage(StorageError::Database(e.to_string()))
            }
        })?;

        row.try_into()
    }

    async fn find_by_id(&self, id: &AccountId) -> Result<Option<Account>, Error> {
        let row = sqlx::query_as::<_, SqliteAccount>("SELECT * FROM accounts WHERE id = ?1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;

        row.map(Account::try_from).transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, Error> {
        let row = sqlx::query_as::<_, SqliteAccount>("SELECT * FROM accounts WHERE email = ?1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;

        row.map(Account::try_from).transpose()
    }

    async fn find_by_phone(&self, phone: &str) -> Result<Option<Account>, Error> {
        let row = sqlx::query_as::<_, SqliteAccount>("SELECT * FROM accounts WHERE phone = ?1")
            .bind(phone)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;

        row.map(Account::try_from).transpose()
    }

    async fn record_login_failure(
        &self,
        email: &str,
        threshold: u32,
        lock_until: DateTime<Utc>,
    ) -> Result<Option<Account>, Error> {
        let now = Utc::now().timestamp();

        // One conditional update: two concurrent failures must both count,
        // and neither may clobber the other's lock write.
        let row = sqlx::query_as::<_, SqliteAccount>(
            r#"
            UPDATE accounts
            SET failed_login_attempts = failed_login_attempts + 1,
                lock_until = CASE
                    WHEN failed_login_attempts + 1 >= ?2 THEN ?3
                    ELSE lock_until
                END,
                updated_at = ?4
            WHERE email = ?1
            RETURNING *
            "#,
        )
        .bind(email)
        .bind(threshold as i64)
        .bind(lock_until.timestamp())
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to record login failure");
            Error::Storage(StorageError::Database(e.to_string()))
        })?;

        row.map(Account::try_from).transpose()
    }

    async fn record_login_success(&self, id: &AccountId, at: DateTime<Utc>) -> Result<(), Error> {
        sqlx::query(
            r#"
            UPDATE accounts
            SET failed_login_attempts = 0, lock_until = NULL, last_login_at = ?2, updated_at = ?2
            WHERE id = ?1
            "#,
        )
        .bind(id.as_str())
        .bind(at.timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;

        Ok(())
    }

    async fn clear_expired_lock(&self, id: &AccountId) -> Result<(), Error> {
        sqlx::query(
            r#"
            UPDATE accounts
            SET failed_login_attempts = 0, lock_until = NULL, updated_at = ?2
            WHERE id = ?1
            "#,
        )
        .bind(id.as_str())
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;

        Ok(())
    }

    async fn set_access(
        &self,
        id: &AccountId,
        granted: bool,
        changed_by: &AccountId,
    ) -> Result<(), Error> {
        let now = Utc::now().timestamp();

        sqlx::query(
            r#"
            UPDATE accounts
            SET has_access = ?2, access_changed_by = ?3, access_changed_at = ?4, updated_at = ?4
            WHERE id = ?1
            "#,
        )
        .bind(id.as_str())
        .bind(granted)
        .bind(changed_by.as_str())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;

        Ok(())
    }
}

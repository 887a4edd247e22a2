//! SQLite implementation of the login-attempt audit log.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::collections::BTreeSet;
use std::str::FromStr;

use warden_core::{
    Error,
    attempt::{
        AttemptFilter, AttemptPage, DailyAttemptStats, LoginAttempt, NewLoginAttempt,
        SuspiciousReason,
    },
    account::AccountId,
    device::DeviceInfo,
    error::{FailureReason, StorageError},
    repositories::AttemptRepository,
};

pub struct SqliteAttemptRepository {
    pool: SqlitePool,
}

impl SqliteAttemptRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Internal struct for query results
#[derive(Debug, sqlx::FromRow)]
struct SqliteLoginAttempt {
    id: i64,
    email: String,
    account_id: Option<String>,
    success: bool,
    failure_reason: Option<String>,
    ip_address: Option<String>,
    user_agent: Option<String>,
    browser: Option<String>,
    os: Option<String>,
    is_mobile: bool,
    location: Option<String>,
    attempted_at: i64,
    session_duration_secs: Option<i64>,
    suspicious: bool,
    suspicious_reasons: Option<String>,
}

impl From<SqliteLoginAttempt> for LoginAttempt {
    fn from(row: SqliteLoginAttempt) -> Self {
        let suspicious_reasons: BTreeSet<SuspiciousReason> = row
            .suspicious_reasons
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .filter(|s| !s.is_empty())
            .filter_map(|s| SuspiciousReason::from_str(s).ok())
            .collect();

        LoginAttempt {
            id: row.id,
            email: row.email,
            account_id: row.account_id.map(|id| AccountId::new(&id)),
            success: row.success,
            failure_reason: row
                .failure_reason
                .as_deref()
                .and_then(|r| FailureReason::from_str(r).ok()),
            ip_address: row.ip_address,
            user_agent: row.user_agent,
            device: DeviceInfo {
                browser: row.browser,
                os: row.os,
                is_mobile: row.is_mobile,
            },
            location: row.location,
            attempted_at: DateTime::from_timestamp(row.attempted_at, 0).unwrap_or_default(),
            session_duration_secs: row.session_duration_secs,
            suspicious: row.suspicious,
            suspicious_reasons,
        }
    }
}

fn push_filters<'a>(builder: &mut QueryBuilder<'a, Sqlite>, filter: &'a AttemptFilter) {
    if let Some(from) = filter.from {
        builder.push(" AND attempted_at >= ").push_bind(from.timestamp());
    }
    if let Some(to) = filter.to {
        builder.push(" AND attempted_at <= ").push_bind(to.timestamp());
    }
    if let Some(success) = filter.success {
        builder.push(" AND success = ").push_bind(success);
    }
    if let Some(suspicious) = filter.suspicious {
        builder.push(" AND suspicious = ").push_bind(suspicious);
    }
    if let Some(email) = &filter.email {
        builder.push(" AND email = ").push_bind(email.as_str());
    }
    if let Some(ip) = &filter.ip_address {
        builder.push(" AND ip_address = ").push_bind(ip.as_str());
    }
}

#[async_trait]
impl AttemptRepository for SqliteAttemptRepository {
    async fn insert(&self, attempt: NewLoginAttempt) -> Result<LoginAttempt, Error> {
        let row = sqlx::query_as::<_, SqliteLoginAttempt>(
            r#"
            INSERT INTO login_attempts (email, account_id, success, failure_reason, ip_address,
                user_agent, browser, os, is_mobile, location, attempted_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            RETURNING *
            "#,
        )
        .bind(&attempt.email)
        .bind(attempt.account_id.as_ref().map(|id| id.as_str().to_string()))
        .bind(attempt.success)
        .bind(attempt.failure_reason.map(|r| r.as_str()))
        .bind(&attempt.ip_address)
        .bind(&attempt.user_agent)
        .bind(&attempt.device.browser)
        .bind(&attempt.device.os)
        .bind(attempt.device.is_mobile)
        .bind(&attempt.location)
        .bind(attempt.attempted_at.timestamp())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to insert login attempt");
            Error::Storage(StorageError::Database(e.to_string()))
        })?;

        Ok(row.into())
    }

    async fn mark_suspicious(
        &self,
        id: i64,
        reasons: &BTreeSet<SuspiciousReason>,
    ) -> Result<(), Error> {
        let joined = reasons
            .iter()
            .map(|r| r.as_str())
            .collect::<Vec<_>>()
            .join(",");

        sqlx::query("UPDATE login_attempts SET suspicious = 1, suspicious_reasons = ?2 WHERE id = ?1")
            .bind(id)
            .bind(joined)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;

        Ok(())
    }

    async fn set_session_duration(&self, id: i64, duration_secs: i64) -> Result<(), Error> {
        sqlx::query("UPDATE login_attempts SET session_duration_secs = ?2 WHERE id = ?1")
            .bind(id)
            .bind(duration_secs)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;

        Ok(())
    }

    async fn count_failures_for_email(
        &self,
        email: &str,
        since: DateTime<Utc>,
    ) -> Result<u32, Error> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM login_attempts WHERE email = ?1 AND success = 0 AND attempted_at >= ?2",
        )
        .bind(email)
        .bind(since.timestamp())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;

        Ok(count as u32)
    }

    async fn count_failures_for_ip(&self, ip: &str, since: DateTime<Utc>) -> Result<u32, Error> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM login_attempts WHERE ip_address = ?1 AND success = 0 AND attempted_at >= ?2",
        )
        .bind(ip)
        .bind(since.timestamp())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;

        Ok(count as u32)
    }

    async fn oldest_failure_for_email(
        &self,
        email: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, Error> {
        let oldest: Option<i64> = sqlx::query_scalar(
            "SELECT MIN(attempted_at) FROM login_attempts WHERE email = ?1 AND success = 0 AND attempted_at >= ?2",
        )
        .bind(email)
        .bind(since.timestamp())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;

        Ok(oldest.and_then(|ts| DateTime::from_timestamp(ts, 0)))
    }

    async fn oldest_failure_for_ip(
        &self,
        ip: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, Error> {
        let oldest: Option<i64> = sqlx::query_scalar(
            "SELECT MIN(attempted_at) FROM login_attempts WHERE ip_address = ?1 AND success = 0 AND attempted_at >= ?2",
        )
        .bind(ip)
        .bind(since.timestamp())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;

        Ok(oldest.and_then(|ts| DateTime::from_timestamp(ts, 0)))
    }

    async fn previous_attempt_at(
        &self,
        email: &str,
        before: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, Error> {
        let previous: Option<i64> = sqlx::query_scalar(
            "SELECT MAX(attempted_at) FROM login_attempts WHERE email = ?1 AND attempted_at < ?2",
        )
        .bind(email)
        .bind(before.timestamp())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;

        Ok(previous.and_then(|ts| DateTime::from_timestamp(ts, 0)))
    }

    async fn find_page(&self, filter: &AttemptFilter) -> Result<AttemptPage, Error> {
        let mut count_builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT COUNT(*) FROM login_attempts WHERE 1 = 1");
        push_filters(&mut count_builder, filter);
        let total: i64 = count_builder
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;

        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT * FROM login_attempts WHERE 1 = 1");
        push_filters(&mut builder, filter);
        builder
            .push(" ORDER BY attempted_at DESC, id DESC LIMIT ")
            .push_bind(filter.per_page() as i64)
            .push(" OFFSET ")
            .push_bind(filter.offset() as i64);

        let rows: Vec<SqliteLoginAttempt> = builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;

        Ok(AttemptPage {
            attempts: rows.into_iter().map(Into::into).collect(),
            total: total as u64,
            page: filter.page(),
            per_page: filter.per_page(),
        })
    }

    async fn daily_stats(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<DailyAttemptStats>, Error> {
        let rows: Vec<(String, i64, i64)> = sqlx::query_as(
            r#"
            SELECT date(attempted_at, 'unixepoch') AS day,
                SUM(CASE WHEN success = 1 THEN 1 ELSE 0 END) AS successes,
                SUM(CASE WHEN success = 0 THEN 1 ELSE 0 END) AS failures
            FROM login_attempts
            WHERE attempted_at >= ?1 AND attempted_at <= ?2
            GROUP BY day
            ORDER BY day
            "#,
        )
        .bind(from.timestamp())
        .bind(to.timestamp())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;

        rows.into_iter()
            .map(|(day, successes, failures)| {
                let day = NaiveDate::parse_from_str(&day, "%Y-%m-%d").map_err(|e| {
                    Error::Storage(StorageError::Database(format!("Invalid day bucket: {e}")))
                })?;
                Ok(DailyAttemptStats {
                    day,
                    successes,
                    failures,
                })
            })
            .collect()
    }

    async fn purge_older_than(&self, before: DateTime<Utc>) -> Result<u64, Error> {
        let result = sqlx::query("DELETE FROM login_attempts WHERE attempted_at < ?1")
            .bind(before.timestamp())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to purge old attempts");
                Error::Storage(StorageError::Database(e.to_string()))
            })?;

        Ok(result.rows_affected())
    }
}

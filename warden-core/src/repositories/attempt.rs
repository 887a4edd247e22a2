//! Repository trait for the login-attempt audit log.
//!
//! The log is append-only: rows are created once and never rewritten,
//! except for the suspicious fields (filled by the classifier right after
//! insert) and the session duration (back-filled on logout). Window
//! queries count rows on demand; the rate limiter's sliding window is a
//! recount over this log, not a separate counter.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

use crate::{
    Error,
    attempt::{AttemptFilter, AttemptPage, DailyAttemptStats, LoginAttempt, NewLoginAttempt,
        SuspiciousReason},
};

#[async_trait]
pub trait AttemptRepository: Send + Sync + 'static {
    /// Append one attempt record.
    async fn insert(&self, attempt: NewLoginAttempt) -> Result<LoginAttempt, Error>;

    /// Set the suspicious flag and reason tags on an existing record.
    /// The only permitted post-insert mutation besides session duration.
    async fn mark_suspicious(
        &self,
        id: i64,
        reasons: &BTreeSet<SuspiciousReason>,
    ) -> Result<(), Error>;

    /// Back-fill the session duration of a successful attempt.
    async fn set_session_duration(&self, id: i64, duration_secs: i64) -> Result<(), Error>;

    /// Count failed attempts for an identity since the cutoff.
    async fn count_failures_for_email(
        &self,
        email: &str,
        since: DateTime<Utc>,
    ) -> Result<u32, Error>;

    /// Count failed attempts from a network origin since the cutoff.
    async fn count_failures_for_ip(&self, ip: &str, since: DateTime<Utc>) -> Result<u32, Error>;

    /// Timestamp of the oldest counted failure for an identity since the
    /// cutoff; the sliding-window count next decreases at that timestamp
    /// plus the window length.
    async fn oldest_failure_for_email(
        &self,
        email: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, Error>;

    async fn oldest_failure_for_ip(
        &self,
        ip: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, Error>;

    /// Timestamp of the most recent attempt (any outcome) for an identity
    /// strictly before `before`.
    async fn previous_attempt_at(
        &self,
        email: &str,
        before: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, Error>;

    /// Filtered, paginated audit query, newest first.
    async fn find_page(&self, filter: &AttemptFilter) -> Result<AttemptPage, Error>;

    /// Aggregate daily success/failure counts over a time range.
    async fn daily_stats(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<DailyAttemptStats>, Error>;

    /// Delete records older than the cutoff. Used by retention cleanup.
    async fn purge_older_than(&self, before: DateTime<Utc>) -> Result<u64, Error>;
}

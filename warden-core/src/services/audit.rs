//! Audit queries and retention over the attempt log.
//!
//! Reads are admin-facing: filtered pages of attempt records plus per-day
//! success/failure counts. Retention deletes records past the retention
//! period, either on demand or from a periodic background task that stops
//! on a shutdown signal.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::{
    Error,
    attempt::{AttemptFilter, AttemptPage, DailyAttemptStats},
    config::SecurityConfig,
    repositories::AttemptRepository,
};

/// One admin query result: the requested page plus daily counts over the
/// same date range.
#[derive(Debug, Clone)]
pub struct AuditReport {
    pub page: AttemptPage,
    pub daily: Vec<DailyAttemptStats>,
}

pub struct AuditService<R: AttemptRepository> {
    repository: Arc<R>,
    retention_period: Duration,
}

impl<R: AttemptRepository> AuditService<R> {
    pub fn new(repository: Arc<R>, config: &SecurityConfig) -> Self {
        Self {
            repository,
            retention_period: config.retention_period,
        }
    }

    /// Query a page of attempt records with daily counts for the same
    /// range. An unbounded range defaults to the retention period.
    pub async fn query(&self, filter: &AttemptFilter) -> Result<AuditReport, Error> {
        let page = self.repository.find_page(filter).await?;

        let to = filter.to.unwrap_or_else(Utc::now);
        let from = filter.from.unwrap_or(to - self.retention_period);
        let daily = self.repository.daily_stats(from, to).await?;

        Ok(AuditReport { page, daily })
    }

    /// Backfill the session duration onto a successful login's record when
    /// the session ends.
    pub async fn close_session(&self, attempt_id: i64, duration_secs: i64) -> Result<(), Error> {
        self.repository
            .set_session_duration(attempt_id, duration_secs.max(0))
            .await
    }

    /// Delete attempt records older than the retention period. Returns the
    /// number of records deleted.
    pub async fn purge_expired(&self) -> Result<u64, Error> {
        let cutoff = Utc::now() - self.retention_period;
        let purged = self.repository.purge_older_than(cutoff).await?;
        if purged > 0 {
            tracing::info!(purged, cutoff = %cutoff, "Purged expired attempt records");
        }
        Ok(purged)
    }

    /// Spawn the periodic retention task.
    ///
    /// Runs a purge once per `interval` until `shutdown` flips to true.
    /// Purge failures are logged and retried on the next tick.
    pub fn start_retention_task(
        self: &Arc<Self>,
        interval: std::time::Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = service.purge_expired().await {
                            tracing::error!(error = %e, "Attempt-record purge failed");
                        }
                    }
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            tracing::debug!("Retention task shutting down");
                            break;
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attempt::NewLoginAttempt;
    use crate::error::FailureReason;
    use crate::repositories::AttemptRepository as _;
    use crate::services::support::MemoryAttemptRepository;

    fn service(repo: Arc<MemoryAttemptRepository>) -> AuditService<MemoryAttemptRepository> {
        AuditService::new(repo, &SecurityConfig::default())
    }

    async fn insert_attempt(
        repo: &MemoryAttemptRepository,
        email: &str,
        success: bool,
        age: Duration,
    ) -> i64 {
        let attempt = if success {
            NewLoginAttempt::success(email.to_string(), Default::default(), None, None)
        } else {
            NewLoginAttempt::failure(
                email.to_string(),
                None,
                FailureReason::InvalidCredentials,
                None,
                None,
            )
        };
        repo.insert(attempt.with_attempted_at(Utc::now() - age))
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_query_returns_page_and_daily_counts() {
        let repo = Arc::new(MemoryAttemptRepository::new());
        insert_attempt(&repo, "a@x.com", true, Duration::hours(1)).await;
        insert_attempt(&repo, "a@x.com", false, Duration::hours(2)).await;
        insert_attempt(&repo, "b@x.com", false, Duration::hours(3)).await;

        let report = service(repo)
            .query(&AttemptFilter::default())
            .await
            .unwrap();

        assert_eq!(report.page.total, 3);
        let successes: i64 = report.daily.iter().map(|d| d.successes).sum();
        let failures: i64 = report.daily.iter().map(|d| d.failures).sum();
        assert_eq!(successes, 1);
        assert_eq!(failures, 2);
    }

    #[tokio::test]
    async fn test_query_filters_by_email() {
        let repo = Arc::new(MemoryAttemptRepository::new());
        insert_attempt(&repo, "a@x.com", false, Duration::hours(1)).await;
        insert_attempt(&repo, "b@x.com", false, Duration::hours(1)).await;

        let filter = AttemptFilter {
            email: Some("a@x.com".to_string()),
            ..Default::default()
        };
        let report = service(repo).query(&filter).await.unwrap();
        assert_eq!(report.page.total, 1);
        assert_eq!(report.page.attempts[0].email, "a@x.com");
    }

    #[tokio::test]
    async fn test_close_session_backfills_duration() {
        let repo = Arc::new(MemoryAttemptRepository::new());
        let id = insert_attempt(&repo, "a@x.com", true, Duration::zero()).await;

        service(repo.clone()).close_session(id, 3600).await.unwrap();

        let attempts = repo.attempts.lock().unwrap();
        assert_eq!(attempts[0].session_duration_secs, Some(3600));
    }

    #[tokio::test]
    async fn test_close_session_clamps_negative_duration() {
        let repo = Arc::new(MemoryAttemptRepository::new());
        let id = insert_attempt(&repo, "a@x.com", true, Duration::zero()).await;

        service(repo.clone()).close_session(id, -5).await.unwrap();

        let attempts = repo.attempts.lock().unwrap();
        assert_eq!(attempts[0].session_duration_secs, Some(0));
    }

    #[tokio::test]
    async fn test_purge_removes_only_expired_records() {
        let repo = Arc::new(MemoryAttemptRepository::new());
        insert_attempt(&repo, "old@x.com", false, Duration::days(91)).await;
        insert_attempt(&repo, "kept@x.com", false, Duration::days(89)).await;

        let purged = service(repo.clone()).purge_expired().await.unwrap();
        assert_eq!(purged, 1);

        let attempts = repo.attempts.lock().unwrap();
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].email, "kept@x.com");
    }

    #[tokio::test]
    async fn test_retention_task_purges_and_stops_on_shutdown() {
        let repo = Arc::new(MemoryAttemptRepository::new());
        insert_attempt(&repo, "old@x.com", false, Duration::days(120)).await;

        let service = Arc::new(service(repo.clone()));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle =
            service.start_retention_task(std::time::Duration::from_millis(10), shutdown_rx);

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(repo.attempts.lock().unwrap().is_empty());

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }
}

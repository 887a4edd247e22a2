//! Attempt recorder service.
//!
//! Audit logging is fire-and-forget but durable: a failed write must never
//! abort the authentication decision. Write failures are surfaced only to
//! operational logs and an internal drop counter, never to the end user.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::{
    attempt::{LoginAttempt, NewLoginAttempt},
    repositories::AttemptRepository,
};

pub struct AttemptRecorder<R: AttemptRepository> {
    repository: Arc<R>,
    dropped: AtomicU64,
}

impl<R: AttemptRepository> AttemptRecorder<R> {
    pub fn new(repository: Arc<R>) -> Self {
        Self {
            repository,
            dropped: AtomicU64::new(0),
        }
    }

    /// Append one attempt record.
    ///
    /// Always succeeds from the caller's perspective. On a storage error
    /// the record is dropped, the error is logged, and `None` is returned
    /// so the login decision can proceed.
    pub async fn record(&self, attempt: NewLoginAttempt) -> Option<LoginAttempt> {
        match self.repository.insert(attempt).await {
            Ok(record) => Some(record),
            Err(e) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::error!(error = %e, "Failed to record login attempt");
                None
            }
        }
    }

    /// Number of audit records dropped due to storage failures, for
    /// operational visibility.
    pub fn dropped_records(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

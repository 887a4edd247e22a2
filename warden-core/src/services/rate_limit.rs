//! Sliding-window rate limiter over the attempt log.
//!
//! Counts failed attempts per identity and, separately, per network origin
//! within a trailing window by recounting rows: a true sliding window,
//! not a fixed bucket, so the boundary cannot be gamed. Runs before any
//! credential comparison.
//!
//! Evaluation failures fail open: availability of login is prioritized
//! over strict rate-limiting when the audit store itself is degraded.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use crate::{config::SecurityConfig, repositories::AttemptRepository};

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub limited: bool,
    /// Attempts left before the limit trips, across both dimensions.
    pub remaining: u32,
    /// When the sliding count next decreases; set only when limited.
    pub reset_at: Option<DateTime<Utc>>,
}

impl RateLimitDecision {
    fn unlimited(max: u32) -> Self {
        Self {
            limited: false,
            remaining: max,
            reset_at: None,
        }
    }
}

pub struct RateLimiter<R: AttemptRepository> {
    repository: Arc<R>,
    window: Duration,
    max: u32,
}

impl<R: AttemptRepository> RateLimiter<R> {
    pub fn new(repository: Arc<R>, config: &SecurityConfig) -> Self {
        Self {
            repository,
            window: config.rate_limit_window,
            max: config.rate_limit_max,
        }
    }

    /// Check both the identity and the origin against the window.
    ///
    /// Limited when either dimension has reached the maximum. On internal
    /// failure the check fails open and logs.
    pub async fn check(&self, email: &str, ip_address: Option<&str>) -> RateLimitDecision {
        let now = Utc::now();
        let since = now - self.window;

        let email_count = match self.repository.count_failures_for_email(email, since).await {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(error = %e, "Rate limit evaluation failed, failing open");
                return RateLimitDecision::unlimited(self.max);
            }
        };

        let ip_count = match ip_address {
            Some(ip) => match self.repository.count_failures_for_ip(ip, since).await {
                Ok(count) => count,
                Err(e) => {
                    tracing::warn!(error = %e, "Rate limit evaluation failed, failing open");
                    return RateLimitDecision::unlimited(self.max);
                }
            },
            None => 0,
        };

        let worst = email_count.max(ip_count);
        if worst < self.max {
            return RateLimitDecision {
                limited: false,
                remaining: self.max - worst,
                reset_at: None,
            };
        }

        let reset_at = self.reset_at(email, ip_address, email_count, ip_count, since).await;
        RateLimitDecision {
            limited: true,
            remaining: 0,
            reset_at,
        }
    }

    /// The earliest moment either limited dimension's count decreases:
    /// its oldest counted failure plus the window length.
    async fn reset_at(
        &self,
        email: &str,
        ip_address: Option<&str>,
        email_count: u32,
        ip_count: u32,
        since: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        let mut candidates: Vec<DateTime<Utc>> = Vec::new();

        if email_count >= self.max {
            if let Ok(Some(oldest)) = self.repository.oldest_failure_for_email(email, since).await
            {
                candidates.push(oldest + self.window);
            }
        }

        if ip_count >= self.max {
            if let Some(ip) = ip_address {
                if let Ok(Some(oldest)) = self.repository.oldest_failure_for_ip(ip, since).await {
                    candidates.push(oldest + self.window);
                }
            }
        }

        candidates.into_iter().min()
    }
}

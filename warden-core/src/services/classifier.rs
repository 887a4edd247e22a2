//! Abuse classifier for just-recorded login attempts.
//!
//! Runs synchronously right after a record is created, evaluating only
//! that identity's recent history. Heuristics are independent and OR'd;
//! the record is suspicious if any fired, and the tags are a deduplicated
//! set. Classification failures never fail the login flow.

use chrono::{Duration, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::{
    attempt::{LoginAttempt, SuspiciousReason},
    config::SecurityConfig,
    repositories::AttemptRepository,
};

/// Hook for geo-IP heuristics.
///
/// No geolocation provider is wired in this core; the default resolver
/// never resolves and never flags, so `UNUSUAL_LOCATION` never fires.
pub trait GeoResolver: Send + Sync + 'static {
    /// Coarse location for a network origin, best-effort.
    fn resolve(&self, ip_address: Option<&str>) -> Option<String>;

    /// Whether the location is unusual for this identity.
    fn is_unusual(&self, email: &str, location: Option<&str>) -> bool;
}

pub struct NoopGeoResolver;

impl GeoResolver for NoopGeoResolver {
    fn resolve(&self, _ip_address: Option<&str>) -> Option<String> {
        None
    }

    fn is_unusual(&self, _email: &str, _location: Option<&str>) -> bool {
        false
    }
}

pub struct AbuseClassifier<R: AttemptRepository> {
    repository: Arc<R>,
    geo: Arc<dyn GeoResolver>,
    window: Duration,
    threshold: u32,
    burst_window: Duration,
    burst_max: u32,
    rapid_gap: Duration,
    min_user_agent_len: usize,
}

impl<R: AttemptRepository> AbuseClassifier<R> {
    pub fn new(repository: Arc<R>, config: &SecurityConfig) -> Self {
        Self::with_geo_resolver(repository, config, Arc::new(NoopGeoResolver))
    }

    pub fn with_geo_resolver(
        repository: Arc<R>,
        config: &SecurityConfig,
        geo: Arc<dyn GeoResolver>,
    ) -> Self {
        Self {
            repository,
            geo,
            window: config.classifier_window,
            threshold: config.classifier_threshold,
            burst_window: config.rate_limit_window,
            burst_max: config.rate_limit_max,
            rapid_gap: config.rapid_attempt_gap,
            min_user_agent_len: config.min_user_agent_len,
        }
    }

    /// Evaluate a just-recorded attempt and persist the suspicious fields
    /// when any heuristic fired. Returns the fired tags.
    pub async fn classify(&self, attempt: &LoginAttempt) -> BTreeSet<SuspiciousReason> {
        let mut reasons = BTreeSet::new();

        self.check_failure_volume(attempt, &mut reasons).await;
        self.check_rapid_attempts(attempt, &mut reasons).await;
        self.check_device(attempt, &mut reasons);
        self.check_location(attempt, &mut reasons);

        if !reasons.is_empty() {
            tracing::info!(
                email = %attempt.email,
                reasons = ?reasons,
                "Login attempt classified as suspicious"
            );
            if let Err(e) = self.repository.mark_suspicious(attempt.id, &reasons).await {
                tracing::warn!(error = %e, attempt_id = attempt.id,
                    "Failed to persist suspicious classification");
            }
        }

        reasons
    }

    /// `MULTIPLE_FAILED_ATTEMPTS` over the trailing hour, counting the
    /// current attempt; `BRUTE_FORCE_PATTERN` when the failures also form
    /// a tight burst inside the rate-limit window.
    async fn check_failure_volume(
        &self,
        attempt: &LoginAttempt,
        reasons: &mut BTreeSet<SuspiciousReason>,
    ) {
        let window_count = match self
            .repository
            .count_failures_for_email(&attempt.email, attempt.attempted_at - self.window)
            .await
        {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(error = %e, "Failed-attempt count unavailable, skipping heuristic");
                return;
            }
        };

        if window_count < self.threshold {
            return;
        }
        reasons.insert(SuspiciousReason::MultipleFailedAttempts);

        let burst_count = match self
            .repository
            .count_failures_for_email(&attempt.email, attempt.attempted_at - self.burst_window)
            .await
        {
            Ok(count) => count,
            Err(_) => return,
        };
        if burst_count >= self.burst_max {
            reasons.insert(SuspiciousReason::BruteForcePattern);
        }
    }

    async fn check_rapid_attempts(
        &self,
        attempt: &LoginAttempt,
        reasons: &mut BTreeSet<SuspiciousReason>,
    ) {
        let previous = match self
            .repository
            .previous_attempt_at(&attempt.email, attempt.attempted_at)
            .await
        {
            Ok(previous) => previous,
            Err(e) => {
                tracing::warn!(error = %e, "Previous-attempt lookup failed, skipping heuristic");
                return;
            }
        };

        if let Some(previous) = previous {
            if attempt.attempted_at - previous < self.rapid_gap {
                reasons.insert(SuspiciousReason::RapidAttempts);
            }
        }
    }

    /// Missing or implausibly short client signature.
    fn check_device(&self, attempt: &LoginAttempt, reasons: &mut BTreeSet<SuspiciousReason>) {
        let plausible = attempt
            .user_agent
            .as_deref()
            .is_some_and(|ua| ua.len() >= self.min_user_agent_len);
        if !plausible {
            reasons.insert(SuspiciousReason::UnusualDevice);
        }
    }

    fn check_location(&self, attempt: &LoginAttempt, reasons: &mut BTreeSet<SuspiciousReason>) {
        let location = attempt
            .location
            .clone()
            .or_else(|| self.geo.resolve(attempt.ip_address.as_deref()));
        if self.geo.is_unusual(&attempt.email, location.as_deref()) {
            reasons.insert(SuspiciousReason::UnusualLocation);
        }
    }
}

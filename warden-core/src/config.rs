//! Configuration for lockout, rate limiting, classification, and tokens.

use chrono::Duration;

/// Thresholds and windows for the account-lockout, rate-limit, and abuse
/// classification policies.
///
/// The lockout counter and the rate limiter are deliberately independent
/// mechanisms: an account can be rate-limited without being locked and
/// vice versa.
#[derive(Debug, Clone)]
pub struct SecurityConfig {
    /// Failed verifications before the account locks.
    pub lockout_threshold: u32,

    /// How long a lock lasts once set.
    pub lockout_duration: Duration,

    /// Trailing window for rate-limit recounting.
    pub rate_limit_window: Duration,

    /// Failures per identity or per origin inside the window before
    /// requests are rejected ahead of credential comparison.
    pub rate_limit_max: u32,

    /// Trailing window the classifier counts failures over.
    pub classifier_window: Duration,

    /// Failures inside the classifier window that mark an attempt
    /// suspicious.
    pub classifier_threshold: u32,

    /// Two attempts closer together than this are flagged as rapid.
    pub rapid_attempt_gap: Duration,

    /// Client signatures shorter than this are implausible.
    pub min_user_agent_len: usize,

    /// Audit records older than this are purged.
    pub retention_period: Duration,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            lockout_threshold: 5,
            lockout_duration: Duration::hours(2),
            rate_limit_window: Duration::minutes(15),
            rate_limit_max: 5,
            classifier_window: Duration::minutes(60),
            classifier_threshold: 5,
            rapid_attempt_gap: Duration::seconds(10),
            min_user_agent_len: 10,
            retention_period: Duration::days(90),
        }
    }
}

/// Configuration for token issuance and renewal scheduling.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    /// HS256 signing secret, server-held.
    pub secret: Vec<u8>,

    /// Issuer claim, verified when set.
    pub issuer: Option<String>,

    /// Total token lifetime.
    pub lifetime: Duration,

    /// How far before expiry the client schedules a silent renewal.
    pub refresh_lead: Duration,
}

impl TokenConfig {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
            issuer: None,
            lifetime: Duration::days(7),
            refresh_lead: Duration::hours(1),
        }
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = lifetime;
        self
    }

    pub fn with_refresh_lead(mut self, refresh_lead: Duration) -> Self {
        self.refresh_lead = refresh_lead;
        self
    }
}

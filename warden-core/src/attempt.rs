//! Login attempt audit records.
//!
//! One immutable record is appended per login attempt, success or failure.
//! The only mutation permitted after insert is the pair of suspicious
//! fields, which the abuse classifier fills in right after creation, and
//! the session duration, back-filled when a successful session closes.

use crate::{
    account::AccountId,
    device::DeviceInfo,
    error::{FailureReason, ValidationError},
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Tags applied by the abuse classifier. Stored as a deduplicated set.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SuspiciousReason {
    MultipleFailedAttempts,
    RapidAttempts,
    UnusualLocation,
    UnusualDevice,
    BruteForcePattern,
}

impl SuspiciousReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuspiciousReason::MultipleFailedAttempts => "MULTIPLE_FAILED_ATTEMPTS",
            SuspiciousReason::RapidAttempts => "RAPID_ATTEMPTS",
            SuspiciousReason::UnusualLocation => "UNUSUAL_LOCATION",
            SuspiciousReason::UnusualDevice => "UNUSUAL_DEVICE",
            SuspiciousReason::BruteForcePattern => "BRUTE_FORCE_PATTERN",
        }
    }
}

impl std::str::FromStr for SuspiciousReason {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MULTIPLE_FAILED_ATTEMPTS" => Ok(SuspiciousReason::MultipleFailedAttempts),
            "RAPID_ATTEMPTS" => Ok(SuspiciousReason::RapidAttempts),
            "UNUSUAL_LOCATION" => Ok(SuspiciousReason::UnusualLocation),
            "UNUSUAL_DEVICE" => Ok(SuspiciousReason::UnusualDevice),
            "BRUTE_FORCE_PATTERN" => Ok(SuspiciousReason::BruteForcePattern),
            other => Err(ValidationError::InvalidField(format!(
                "Unknown suspicious reason: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for SuspiciousReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An append-only audit record for one login attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginAttempt {
    /// Storage-assigned identifier.
    pub id: i64,

    /// The identity as supplied (normalized), even when it resolved to no
    /// account.
    pub email: String,

    /// The resolved account, when the identity matched one.
    pub account_id: Option<AccountId>,

    pub success: bool,

    /// Set for failures only. Recorded precisely; the enumeration-safe
    /// collapse happens at the boundary, not here.
    pub failure_reason: Option<FailureReason>,

    pub ip_address: Option<String>,

    /// Raw client signature (User-Agent).
    pub user_agent: Option<String>,

    pub device: DeviceInfo,

    /// Coarse location, best-effort; empty without a geo provider.
    pub location: Option<String>,

    /// Authoritative timestamp for all window computations.
    pub attempted_at: DateTime<Utc>,

    /// Back-filled on logout for successful attempts.
    pub session_duration_secs: Option<i64>,

    pub suspicious: bool,

    pub suspicious_reasons: BTreeSet<SuspiciousReason>,
}

/// The data required to append a new attempt record.
#[derive(Debug, Clone)]
pub struct NewLoginAttempt {
    pub email: String,
    pub account_id: Option<AccountId>,
    pub success: bool,
    pub failure_reason: Option<FailureReason>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub device: DeviceInfo,
    pub location: Option<String>,
    pub attempted_at: DateTime<Utc>,
}

impl NewLoginAttempt {
    /// A successful attempt for a resolved account.
    pub fn success(
        email: String,
        account_id: AccountId,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> Self {
        let device = DeviceInfo::from_user_agent(user_agent.as_deref());
        Self {
            email,
            account_id: Some(account_id),
            success: true,
            failure_reason: None,
            ip_address,
            user_agent,
            device,
            location: None,
            attempted_at: Utc::now(),
        }
    }

    /// A failed attempt; `account_id` is `None` when the identity did not
    /// resolve.
    pub fn failure(
        email: String,
        account_id: Option<AccountId>,
        reason: FailureReason,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> Self {
        let device = DeviceInfo::from_user_agent(user_agent.as_deref());
        Self {
            email,
            account_id,
            success: false,
            failure_reason: Some(reason),
            ip_address,
            user_agent,
            device,
            location: None,
            attempted_at: Utc::now(),
        }
    }

    pub fn with_attempted_at(mut self, attempted_at: DateTime<Utc>) -> Self {
        self.attempted_at = attempted_at;
        self
    }

    pub fn with_location(mut self, location: Option<String>) -> Self {
        self.location = location;
        self
    }
}

/// Filter for the administrative audit query.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttemptFilter {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub success: Option<bool>,
    pub suspicious: Option<bool>,
    pub email: Option<String>,
    pub ip_address: Option<String>,
    /// 1-based page number; 0 is treated as 1.
    pub page: u32,
    /// Rows per page; 0 falls back to the default of 50.
    pub per_page: u32,
}

impl AttemptFilter {
    pub const DEFAULT_PER_PAGE: u32 = 50;

    pub fn page(&self) -> u32 {
        self.page.max(1)
    }

    pub fn per_page(&self) -> u32 {
        if self.per_page == 0 {
            Self::DEFAULT_PER_PAGE
        } else {
            self.per_page
        }
    }

    pub fn offset(&self) -> u32 {
        (self.page() - 1) * self.per_page()
    }
}

/// One page of audit rows, newest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptPage {
    pub attempts: Vec<LoginAttempt>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
}

/// Aggregate success/failure counts for one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyAttemptStats {
    pub day: NaiveDate,
    pub successes: i64,
    pub failures: i64,
}

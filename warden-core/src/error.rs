//! Error types for the warden authentication core.
//!
//! Two layers live here. [`Error`] is the internal, structured error used
//! between services and repositories. [`FailureReason`] is the closed
//! taxonomy surfaced to callers of the login and refresh operations: every
//! failure a caller can observe is one of these kinds, never a raw internal
//! error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Token error: {0}")]
    Token(#[from] TokenError),
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account already exists")]
    AccountAlreadyExists,

    #[error("Account locked")]
    AccountLocked { until: Option<DateTime<Utc>> },
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Record not found")]
    NotFound,

    #[error("Constraint violation: {0}")]
    Constraint(String),
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid email format: {0}")]
    InvalidEmail(String),

    #[error("Invalid phone number: {0}")]
    InvalidPhone(String),

    #[error("Invalid password: {0}")]
    InvalidPassword(String),

    #[error("Invalid role: {0}")]
    InvalidRole(String),

    #[error("Invalid field: {0}")]
    InvalidField(String),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Token expired")]
    Expired,

    #[error("Invalid token: {0}")]
    Invalid(String),

    #[error("Token signing failed: {0}")]
    Signing(String),
}

impl Error {
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Error::Auth(_))
    }

    pub fn is_storage_error(&self) -> bool {
        matches!(self, Error::Storage(_))
    }

    pub fn is_validation_error(&self) -> bool {
        matches!(self, Error::Validation(_))
    }

    pub fn is_token_error(&self) -> bool {
        matches!(self, Error::Token(_))
    }
}

/// The closed failure taxonomy surfaced to callers.
///
/// `UserNotFound` is recorded precisely in the audit log but collapsed into
/// `InvalidCredentials` at the external boundary so that responses never
/// reveal whether an identity exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureReason {
    InvalidCredentials,
    UserNotFound,
    AccountLocked,
    RateLimited,
    ValidationError,
    TokenExpired,
    InvalidToken,
    ServerError,
    EmailNotVerified,
    NoAccess,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::InvalidCredentials => "INVALID_CREDENTIALS",
            FailureReason::UserNotFound => "USER_NOT_FOUND",
            FailureReason::AccountLocked => "ACCOUNT_LOCKED",
            FailureReason::RateLimited => "RATE_LIMITED",
            FailureReason::ValidationError => "VALIDATION_ERROR",
            FailureReason::TokenExpired => "TOKEN_EXPIRED",
            FailureReason::InvalidToken => "INVALID_TOKEN",
            FailureReason::ServerError => "SERVER_ERROR",
            FailureReason::EmailNotVerified => "EMAIL_NOT_VERIFIED",
            FailureReason::NoAccess => "NO_ACCESS",
        }
    }

    /// The reason shown to the outside world. `UserNotFound` must never
    /// leak past the boundary.
    pub fn public(&self) -> FailureReason {
        match self {
            FailureReason::UserNotFound => FailureReason::InvalidCredentials,
            other => *other,
        }
    }

    /// Non-leaking, human-readable message for this failure kind.
    pub fn message(&self) -> &'static str {
        match self.public() {
            FailureReason::InvalidCredentials => "Invalid email or password",
            FailureReason::AccountLocked => {
                "Account temporarily locked due to repeated failed logins"
            }
            FailureReason::RateLimited => "Too many attempts, please try again later",
            FailureReason::ValidationError => "Request could not be validated",
            FailureReason::TokenExpired => "Session has expired, please sign in again",
            FailureReason::InvalidToken => "Session is no longer valid",
            FailureReason::ServerError => "An internal error occurred, please try again",
            FailureReason::EmailNotVerified => "Email address has not been verified",
            FailureReason::NoAccess => "Account does not have access to this content",
            // `public()` never returns UserNotFound
            FailureReason::UserNotFound => "Invalid email or password",
        }
    }
}

impl std::str::FromStr for FailureReason {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INVALID_CREDENTIALS" => Ok(FailureReason::InvalidCredentials),
            "USER_NOT_FOUND" => Ok(FailureReason::UserNotFound),
            "ACCOUNT_LOCKED" => Ok(FailureReason::AccountLocked),
            "RATE_LIMITED" => Ok(FailureReason::RateLimited),
            "VALIDATION_ERROR" => Ok(FailureReason::ValidationError),
            "TOKEN_EXPIRED" => Ok(FailureReason::TokenExpired),
            "INVALID_TOKEN" => Ok(FailureReason::InvalidToken),
            "SERVER_ERROR" => Ok(FailureReason::ServerError),
            "EMAIL_NOT_VERIFIED" => Ok(FailureReason::EmailNotVerified),
            "NO_ACCESS" => Ok(FailureReason::NoAccess),
            other => Err(ValidationError::InvalidField(format!(
                "Unknown failure reason: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A login failure as produced by the credential verifier.
///
/// Carries the precise internal reason; [`crate::api::FailureResponse`]
/// applies the enumeration-safe collapse when this crosses the boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginFailure {
    pub reason: FailureReason,
    pub message: String,
    /// Only `AccountLocked` and `RateLimited` carry a retry hint.
    pub retry_after: Option<DateTime<Utc>>,
}

impl LoginFailure {
    pub fn new(reason: FailureReason) -> Self {
        Self {
            reason,
            message: reason.message().to_string(),
            retry_after: None,
        }
    }

    pub fn with_retry_after(reason: FailureReason, retry_after: DateTime<Utc>) -> Self {
        Self {
            reason,
            message: reason.message().to_string(),
            retry_after: Some(retry_after),
        }
    }
}

impl std::fmt::Display for LoginFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.reason, self.message)
    }
}

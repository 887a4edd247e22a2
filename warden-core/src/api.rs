//! Transport-independent request and response contracts.
//!
//! The surrounding web application owns the actual HTTP layer; these types
//! define the login/refresh contract it must speak. The transport supplies
//! the ambient [`RequestContext`] (network origin, client signature);
//! callers never put those in the request body.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    account::{Account, AccountId, Role},
    error::{FailureReason, LoginFailure},
};

/// The caller-supplied half of a login request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub identity: String,
    pub secret: String,
}

/// Ambient context supplied by the transport layer.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Network origin (remote address or forwarded-for).
    pub ip_address: Option<String>,
    /// Raw client signature (User-Agent header).
    pub user_agent: Option<String>,
}

impl RequestContext {
    pub fn new(ip_address: Option<String>, user_agent: Option<String>) -> Self {
        Self {
            ip_address,
            user_agent,
        }
    }
}

/// Advisory landing area derived purely from role and access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedirectHint {
    AdminArea,
    ProtectedArea,
    NeutralArea,
}

impl RedirectHint {
    pub fn for_account(role: Role, has_access: bool) -> Self {
        match (role, has_access) {
            (Role::Admin, _) => RedirectHint::AdminArea,
            (_, true) => RedirectHint::ProtectedArea,
            (_, false) => RedirectHint::NeutralArea,
        }
    }
}

/// The account fields safe to hand back to a caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub id: AccountId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub has_access: bool,
}

impl From<&Account> for AccountSnapshot {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id.clone(),
            email: account.email.clone(),
            first_name: account.first_name.clone(),
            last_name: account.last_name.clone(),
            role: account.role,
            has_access: account.has_access,
        }
    }
}

/// Successful login response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub account: AccountSnapshot,
    pub redirect_hint: RedirectHint,
}

/// Failure response at the external boundary.
///
/// Built from a [`LoginFailure`] via [`FailureResponse::from`], which
/// collapses `UserNotFound` into `InvalidCredentials` so responses never
/// reveal whether an identity exists. The audit log keeps the precise
/// reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureResponse {
    pub error_kind: FailureReason,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<DateTime<Utc>>,
}

impl From<LoginFailure> for FailureResponse {
    fn from(failure: LoginFailure) -> Self {
        let public = failure.reason.public();
        Self {
            error_kind: public,
            message: public.message().to_string(),
            retry_after: failure.retry_after,
        }
    }
}

/// Attributes for the HTTP-only token cookie.
///
/// The cookie carries the identical signed value as the bearer credential,
/// with a max-age equal to the token lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CookieOptions {
    pub name: String,
    pub value: String,
    pub max_age_secs: i64,
    pub http_only: bool,
    pub same_site: String,
    pub secure: bool,
    pub path: String,
}

impl CookieOptions {
    pub const DEFAULT_NAME: &'static str = "warden_token";

    pub fn for_token(token: &str, max_age_secs: i64) -> Self {
        Self {
            name: Self::DEFAULT_NAME.to_string(),
            value: token.to_string(),
            max_age_secs,
            http_only: true,
            same_site: "Strict".to_string(),
            secure: true,
            path: "/".to_string(),
        }
    }

    /// Render as a `Set-Cookie` header value.
    pub fn header_value(&self) -> String {
        let mut value = format!(
            "{}={}; Max-Age={}; Path={}; SameSite={}",
            self.name, self.value, self.max_age_secs, self.path, self.same_site
        );
        if self.http_only {
            value.push_str("; HttpOnly");
        }
        if self.secure {
            value.push_str("; Secure");
        }
        value
    }
}

//! Account records and lockout state
//!
//! The account is the single credential-store record per identity. Beyond
//! the usual profile fields it carries the lockout state the credential
//! verifier operates on:
//!
//! | Field                   | Type                 | Description                                          |
//! | ----------------------- | -------------------- | ---------------------------------------------------- |
//! | `failed_login_attempts` | `u32`                | Consecutive failed verifications since last success. |
//! | `lock_until`            | `Option<DateTime>`   | If in the future, the account is locked.             |
//!
//! A `lock_until` in the past means the account is implicitly unlocked; the
//! counter is cleared lazily on the next verification, never by a
//! background job.

use crate::{
    error::{Error, ValidationError},
    id::{generate_prefixed_id, validate_prefixed_id},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A unique, stable identifier for a specific account.
/// This value should be treated as opaque.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(id: &str) -> Self {
        AccountId(id.to_string())
    }

    pub fn new_random() -> Self {
        AccountId(generate_prefixed_id("acct"))
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_valid(&self) -> bool {
        validate_prefixed_id(&self.0, "acct")
    }
}

impl Default for AccountId {
    fn default() -> Self {
        Self::new_random()
    }
}

impl From<String> for AccountId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for AccountId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The closed set of account roles.
///
/// Exactly one role per account. Parsing is case-insensitive because the
/// data this system inherits stored roles with inconsistent casing; the
/// canonical form is lowercase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Student,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Student => "student",
            Role::User => "user",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "student" => Ok(Role::Student),
            "user" => Ok(Role::User),
            other => Err(ValidationError::InvalidRole(other.to_string())),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalize an identity for lookup and storage: trimmed and lowercased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Representation of an account in the credential store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// The unique identifier for the account.
    pub id: AccountId,

    /// Primary identity. Unique, stored lowercased.
    pub email: String,

    /// Secondary identity, a phone-like contact number. Unique.
    pub phone: String,

    pub first_name: String,

    pub last_name: String,

    /// Argon2 hash of the password. Never serialized and never logged.
    #[serde(skip_serializing)]
    pub password_hash: String,

    pub role: Role,

    /// Grants entry to protected content, independent of role.
    pub has_access: bool,

    /// Who last granted or revoked access, and when.
    pub access_changed_by: Option<AccountId>,
    pub access_changed_at: Option<DateTime<Utc>>,

    /// Consecutive failed verifications since the last success.
    pub failed_login_attempts: u32,

    /// While in the future, the account is locked.
    pub lock_until: Option<DateTime<Utc>>,

    pub last_login_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn builder() -> AccountBuilder {
        AccountBuilder::default()
    }

    /// Whether the account is locked at `now`.
    ///
    /// A `lock_until` in the past does not count as locked; the stale
    /// counter is cleared lazily by the verifier.
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.lock_until.is_some_and(|until| until > now)
    }

    /// Whether a previously set lock has expired and is awaiting the lazy
    /// reset.
    pub fn lock_has_expired(&self, now: DateTime<Utc>) -> bool {
        self.lock_until.is_some_and(|until| until <= now)
    }
}

#[derive(Default)]
pub struct AccountBuilder {
    id: Option<AccountId>,
    email: Option<String>,
    phone: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    password_hash: Option<String>,
    role: Option<Role>,
    has_access: bool,
    access_changed_by: Option<AccountId>,
    access_changed_at: Option<DateTime<Utc>>,
    failed_login_attempts: u32,
    lock_until: Option<DateTime<Utc>>,
    last_login_at: Option<DateTime<Utc>>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

impl AccountBuilder {
    pub fn id(mut self, id: AccountId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn email(mut self, email: String) -> Self {
        self.email = Some(normalize_email(&email));
        self
    }

    pub fn phone(mut self, phone: String) -> Self {
        self.phone = Some(phone);
        self
    }

    pub fn first_name(mut self, first_name: String) -> Self {
        self.first_name = Some(first_name);
        self
    }

    pub fn last_name(mut self, last_name: String) -> Self {
        self.last_name = Some(last_name);
        self
    }

    pub fn password_hash(mut self, password_hash: String) -> Self {
        self.password_hash = Some(password_hash);
        self
    }

    pub fn role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    pub fn has_access(mut self, has_access: bool) -> Self {
        self.has_access = has_access;
        self
    }

    pub fn access_changed_by(mut self, changed_by: Option<AccountId>) -> Self {
        self.access_changed_by = changed_by;
        self
    }

    pub fn access_changed_at(mut self, changed_at: Option<DateTime<Utc>>) -> Self {
        self.access_changed_at = changed_at;
        self
    }

    pub fn failed_login_attempts(mut self, count: u32) -> Self {
        self.failed_login_attempts = count;
        self
    }

    pub fn lock_until(mut self, lock_until: Option<DateTime<Utc>>) -> Self {
        self.lock_until = lock_until;
        self
    }

    pub fn last_login_at(mut self, last_login_at: Option<DateTime<Utc>>) -> Self {
        self.last_login_at = last_login_at;
        self
    }

    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn updated_at(mut self, updated_at: DateTime<Utc>) -> Self {
        self.updated_at = Some(updated_at);
        self
    }

    pub fn build(self) -> Result<Account, Error> {
        let now = Utc::now();
        Ok(Account {
            id: self.id.unwrap_or_default(),
            email: self
                .email
                .ok_or(ValidationError::MissingField("Email is required".to_string()))?,
            phone: self
                .phone
                .ok_or(ValidationError::MissingField("Phone is required".to_string()))?,
            first_name: self.first_name.unwrap_or_default(),
            last_name: self.last_name.unwrap_or_default(),
            password_hash: self.password_hash.ok_or(ValidationError::MissingField(
                "Password hash is required".to_string(),
            ))?,
            role: self.role.unwrap_or(Role::User),
            has_access: self.has_access,
            access_changed_by: self.access_changed_by,
            access_changed_at: self.access_changed_at,
            failed_login_attempts: self.failed_login_attempts,
            lock_until: self.lock_until,
            last_login_at: self.last_login_at,
            created_at: self.created_at.unwrap_or(now),
            updated_at: self.updated_at.unwrap_or(now),
        })
    }
}

/// The data required to create a new account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAccount {
    pub id: AccountId,
    pub email: String,
    pub phone: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
}

impl NewAccount {
    pub fn new(
        email: String,
        phone: String,
        first_name: String,
        last_name: String,
        password_hash: String,
        role: Role,
    ) -> Self {
        Self {
            id: AccountId::new_random(),
            email: normalize_email(&email),
            phone,
            first_name,
            last_name,
            password_hash,
            role,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::str::FromStr;

    #[test]
    fn test_account_id_prefixed() {
        let id = AccountId::new_random();
        assert!(id.as_str().starts_with("acct_"));
        assert!(id.is_valid());

        let other = AccountId::new_random();
        assert_ne!(id, other);

        assert!(!AccountId::new("invalid").is_valid());
    }

    #[test]
    fn test_role_normalizes_casing() {
        assert_eq!(Role::from_str("Admin").unwrap(), Role::Admin);
        assert_eq!(Role::from_str("admin").unwrap(), Role::Admin);
        assert_eq!(Role::from_str("STUDENT").unwrap(), Role::Student);
        assert_eq!(Role::from_str(" user ").unwrap(), Role::User);
        assert!(Role::from_str("superuser").is_err());
    }

    #[test]
    fn test_lock_state() {
        let now = Utc::now();
        let account = Account::builder()
            .email("A@X.com".to_string())
            .phone("+15550001111".to_string())
            .password_hash("hash".to_string())
            .lock_until(Some(now + Duration::hours(2)))
            .build()
            .unwrap();

        assert_eq!(account.email, "a@x.com");
        assert!(account.is_locked(now));
        assert!(!account.lock_has_expired(now));

        // Past the expiry the account is implicitly unlocked
        let later = now + Duration::hours(3);
        assert!(!account.is_locked(later));
        assert!(account.lock_has_expired(later));
    }

    #[test]
    fn test_builder_requires_credentials() {
        let result = Account::builder().email("a@x.com".to_string()).build();
        assert!(result.is_err());
    }
}

//! Repository trait for the credential store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    Error,
    account::{Account, AccountId, NewAccount},
};

/// Storage operations for account records.
///
/// The lockout counter mutations are expressed as single repository
/// operations so implementations can apply them as one atomic update.
/// Concurrent failed logins against the same account are expected; a
/// read-modify-write in application memory would lose increments or let
/// one request's lock write clobber another's.
#[async_trait]
pub trait AccountRepository: Send + Sync + 'static {
    /// Create a new account. Duplicate email or phone is a constraint
    /// violation.
    async fn create(&self, account: NewAccount) -> Result<Account, Error>;

    async fn find_by_id(&self, id: &AccountId) -> Result<Option<Account>, Error>;

    /// Look up by normalized email.
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, Error>;

    async fn find_by_phone(&self, phone: &str) -> Result<Option<Account>, Error>;

    /// Atomically increment the failure counter and, if the post-increment
    /// counter reaches `threshold`, set the lock expiry to `lock_until` in
    /// one conditional update, not a read-compare-write.
    ///
    /// Returns the updated account, or `None` if the email matches no
    /// account (intentionally not an error, to keep callers
    /// enumeration-safe).
    async fn record_login_failure(
        &self,
        email: &str,
        threshold: u32,
        lock_until: DateTime<Utc>,
    ) -> Result<Option<Account>, Error>;

    /// Atomically clear the failure counter and lock expiry and stamp the
    /// last-login timestamp. Called on every successful verification.
    async fn record_login_success(&self, id: &AccountId, at: DateTime<Utc>) -> Result<(), Error>;

    /// Lazy unlock: clear the counter and lock expiry of an account whose
    /// lock has passed. The caller decides when the lock has expired.
    async fn clear_expired_lock(&self, id: &AccountId) -> Result<(), Error>;

    /// Admin grant or revoke of the content-access flag, recording who
    /// made the change and when.
    async fn set_access(
        &self,
        id: &AccountId,
        granted: bool,
        changed_by: &AccountId,
    ) -> Result<(), Error>;
}

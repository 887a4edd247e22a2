//! In-memory repositories shared by the service unit tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::{
    Error,
    account::{Account, AccountId, NewAccount},
    attempt::{AttemptFilter, AttemptPage, DailyAttemptStats, LoginAttempt, NewLoginAttempt,
        SuspiciousReason},
    error::StorageError,
    repositories::{AccountRepository, AttemptRepository},
};

fn unavailable() -> Error {
    Error::Storage(StorageError::Connection("store unavailable".to_string()))
}

/// Vec-backed attempt log. `fail_all` makes every operation return a
/// storage error, for exercising fail-open and swallow paths.
#[derive(Default)]
pub(crate) struct MemoryAttemptRepository {
    pub attempts: Mutex<Vec<LoginAttempt>>,
    pub fail_all: AtomicBool,
}

impl MemoryAttemptRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail_all.store(failing, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), Error> {
        if self.fail_all.load(Ordering::SeqCst) {
            Err(unavailable())
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl AttemptRepository for MemoryAttemptRepository {
    async fn insert(&self, attempt: NewLoginAttempt) -> Result<LoginAttempt, Error> {
        self.check_available()?;
        let mut attempts = self.attempts.lock().unwrap();
        let record = LoginAttempt {
            id: attempts.len() as i64 + 1,
            email: attempt.email,
            account_id: attempt.account_id,
            success: attempt.success,
            failure_reason: attempt.failure_reason,
            ip_address: attempt.ip_address,
            user_agent: attempt.user_agent,
            device: attempt.device,
            location: attempt.location,
            attempted_at: attempt.attempted_at,
            session_duration_secs: None,
            suspicious: false,
            suspicious_reasons: BTreeSet::new(),
        };
        attempts.push(record.clone());
        Ok(record)
    }

    async fn mark_suspicious(
        &self,
        id: i64,
        reasons: &BTreeSet<SuspiciousReason>,
    ) -> Result<(), Error> {
        self.check_available()?;
        let mut attempts = self.attempts.lock().unwrap();
        if let Some(attempt) = attempts.iter_mut().find(|a| a.id == id) {
            attempt.suspicious = true;
            attempt.suspicious_reasons = reasons.clone();
        }
        Ok(())
    }

    async fn set_session_duration(&self, id: i64, duration_secs: i64) -> Result<(), Error> {
        self.check_available()?;
        let mut attempts = self.attempts.lock().unwrap();
        if let Some(attempt) = attempts.iter_mut().find(|a| a.id == id) {
            attempt.session_duration_secs = Some(duration_secs);
        }
        Ok(())
    }

    async fn count_failures_for_email(
        &self,
        email: &str,
        since: DateTime<Utc>,
    ) -> Result<u32, Error> {
        self.check_available()?;
        let attempts = self.attempts.lock().unwrap();
        Ok(attempts
            .iter()
            .filter(|a| !a.success && a.email == email && a.attempted_at >= since)
            .count() as u32)
    }

    async fn count_failures_for_ip(&self, ip: &str, since: DateTime<Utc>) -> Result<u32, Error> {
        self.check_available()?;
        let attempts = self.attempts.lock().unwrap();
        Ok(attempts
            .iter()
            .filter(|a| {
                !a.success && a.ip_address.as_deref() == Some(ip) && a.attempted_at >= since
            })
            .count() as u32)
    }

    async fn oldest_failure_for_email(
        &self,
        email: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, Error> {
        self.check_available()?;
        let attempts = self.attempts.lock().unwrap();
        Ok(attempts
            .iter()
            .filter(|a| !a.success && a.email == email && a.attempted_at >= since)
            .map(|a| a.attempted_at)
            .min())
    }

    async fn oldest_failure_for_ip(
        &self,
        ip: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, Error> {
        self.check_available()?;
        let attempts = self.attempts.lock().unwrap();
        Ok(attempts
            .iter()
            .filter(|a| {
                !a.success && a.ip_address.as_deref() == Some(ip) && a.attempted_at >= since
            })
            .map(|a| a.attempted_at)
            .min())
    }

    async fn previous_attempt_at(
        &self,
        email: &str,
        before: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, Error> {
        self.check_available()?;
        let attempts = self.attempts.lock().unwrap();
        Ok(attempts
            .iter()
            .filter(|a| a.email == email && a.attempted_at < before)
            .map(|a| a.attempted_at)
            .max())
    }

    async fn find_page(&self, filter: &AttemptFilter) -> Result<AttemptPage, Error> {
        self.check_available()?;
        let attempts = self.attempts.lock().unwrap();
        let mut matching: Vec<_> = attempts
            .iter()
            .filter(|a| {
                filter.from.is_none_or(|from| a.attempted_at >= from)
                    && filter.to.is_none_or(|to| a.attempted_at <= to)
                    && filter.success.is_none_or(|s| a.success == s)
                    && filter.suspicious.is_none_or(|s| a.suspicious == s)
                    && filter.email.as_deref().is_none_or(|e| a.email == e)
                    && filter
                        .ip_address
                        .as_deref()
                        .is_none_or(|ip| a.ip_address.as_deref() == Some(ip))
            })
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.attempted_at.cmp(&a.attempted_at));

        let total = matching.len() as u64;
        let page_rows = matching
            .into_iter()
            .skip(filter.offset() as usize)
            .take(filter.per_page() as usize)
            .collect();

        Ok(AttemptPage {
            attempts: page_rows,
            total,
            page: filter.page(),
            per_page: filter.per_page(),
        })
    }

    async fn daily_stats(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<DailyAttemptStats>, Error> {
        self.check_available()?;
        let attempts = self.attempts.lock().unwrap();
        let mut days: Vec<DailyAttemptStats> = Vec::new();
        for attempt in attempts
            .iter()
            .filter(|a| a.attempted_at >= from && a.attempted_at <= to)
        {
            let day = attempt.attempted_at.date_naive();
            let entry = match days.iter_mut().find(|d| d.day == day) {
                Some(entry) => entry,
                None => {
                    days.push(DailyAttemptStats {
                        day,
                        successes: 0,
                        failures: 0,
                    });
                    days.last_mut().unwrap()
                }
            };
            if attempt.success {
                entry.successes += 1;
            } else {
                entry.failures += 1;
            }
        }
        days.sort_by_key(|d| d.day);
        Ok(days)
    }

    async fn purge_older_than(&self, before: DateTime<Utc>) -> Result<u64, Error> {
        self.check_available()?;
        let mut attempts = self.attempts.lock().unwrap();
        let before_len = attempts.len();
        attempts.retain(|a| a.attempted_at >= before);
        Ok((before_len - attempts.len()) as u64)
    }
}

/// Vec-backed credential store. Counter mutations run under one lock,
/// mirroring the single-statement atomicity the SQL backend provides.
#[derive(Default)]
pub(crate) struct MemoryAccountRepository {
    pub accounts: Mutex<Vec<Account>>,
}

impl MemoryAccountRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_account(&self, account: Account) {
        self.accounts.lock().unwrap().push(account);
    }
}

#[async_trait]
impl AccountRepository for MemoryAccountRepository {
    async fn create(&self, new_account: NewAccount) -> Result<Account, Error> {
        let mut accounts = self.accounts.lock().unwrap();
        if accounts
            .iter()
            .any(|a| a.email == new_account.email || a.phone == new_account.phone)
        {
            return Err(Error::Storage(StorageError::Constraint(
                "email or phone already registered".to_string(),
            )));
        }
        let now = Utc::now();
        let account = Account {
            id: new_account.id,
            email: new_account.email,
            phone: new_account.phone,
            first_name: new_account.first_name,
            last_name: new_account.last_name,
            password_hash: new_account.password_hash,
            role: new_account.role,
            has_access: false,
            access_changed_by: None,
            access_changed_at: None,
            failed_login_attempts: 0,
            lock_until: None,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        };
        accounts.push(account.clone());
        Ok(account)
    }

    async fn find_by_id(&self, id: &AccountId) -> Result<Option<Account>, Error> {
        let accounts = self.accounts.lock().unwrap();
        Ok(accounts.iter().find(|a| &a.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, Error> {
        let accounts = self.accounts.lock().unwrap();
        Ok(accounts.iter().find(|a| a.email == email).cloned())
    }

    async fn find_by_phone(&self, phone: &str) -> Result<Option<Account>, Error> {
        let accounts = self.accounts.lock().unwrap();
        Ok(accounts.iter().find(|a| a.phone == phone).cloned())
    }

    async fn record_login_failure(
        &self,
        email: &str,
        threshold: u32,
        lock_until: DateTime<Utc>,
    ) -> Result<Option<Account>, Error> {
        let mut accounts = self.accounts.lock().unwrap();
        let Some(account) = accounts.iter_mut().find(|a| a.email == email) else {
            return Ok(None);
        };
        account.failed_login_attempts += 1;
        if account.failed_login_attempts >= threshold {
            account.lock_until = Some(lock_until);
        }
        account.updated_at = Utc::now();
        Ok(Some(account.clone()))
    }

    async fn record_login_success(&self, id: &AccountId, at: DateTime<Utc>) -> Result<(), Error> {
        let mut accounts = self.accounts.lock().unwrap();
        if let Some(account) = accounts.iter_mut().find(|a| &a.id == id) {
            account.failed_login_attempts = 0;
            account.lock_until = None;
            account.last_login_at = Some(at);
            account.updated_at = at;
        }
        Ok(())
    }

    async fn clear_expired_lock(&self, id: &AccountId) -> Result<(), Error> {
        let mut accounts = self.accounts.lock().unwrap();
        if let Some(account) = accounts.iter_mut().find(|a| &a.id == id) {
            account.failed_login_attempts = 0;
            account.lock_until = None;
            account.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn set_access(
        &self,
        id: &AccountId,
        granted: bool,
        changed_by: &AccountId,
    ) -> Result<(), Error> {
        let mut accounts = self.accounts.lock().unwrap();
        if let Some(account) = accounts.iter_mut().find(|a| &a.id == id) {
            account.has_access = granted;
            account.access_changed_by = Some(changed_by.clone());
            account.access_changed_at = Some(Utc::now());
            account.updated_at = Utc::now();
        }
        Ok(())
    }
}

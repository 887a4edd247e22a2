//! Credential verifier: the login pipeline.
//!
//! Orchestrates rate limiting, lookup, lockout, password comparison, audit
//! recording, abuse classification, and token issuance as an explicit
//! sequential pipeline. Every branch produces exactly one attempt record
//! and one classifier evaluation.
//!
//! Counter mutations go through the repository's atomic operations;
//! concurrent failed logins against the same account must not lose
//! increments or race on the lock transition.

use chrono::Utc;
use std::sync::Arc;

use crate::{
    Error,
    account::{Account, AccountId, NewAccount, Role, normalize_email},
    api::{AccountSnapshot, CookieOptions, LoginRequest, LoginResponse, RedirectHint,
        RequestContext},
    attempt::{LoginAttempt, NewLoginAttempt},
    config::SecurityConfig,
    error::{AuthError, FailureReason, LoginFailure},
    repositories::{AccountRepository, AttemptRepository},
    services::{
        classifier::AbuseClassifier, rate_limit::RateLimiter, recorder::AttemptRecorder,
        token::TokenService,
    },
    token::{AuthToken, Claims},
    validation::{validate_email, validate_password, validate_phone},
};

/// A successful verification: the signed token plus everything the caller
/// needs to respond.
#[derive(Debug, Clone)]
pub struct LoginSuccess {
    pub token: AuthToken,
    pub claims: Claims,
    pub account: AccountSnapshot,
    pub redirect_hint: RedirectHint,
    pub cookie: CookieOptions,
    /// Audit row for this login; `None` if the audit write was dropped.
    pub attempt_id: Option<i64>,
}

impl LoginSuccess {
    pub fn response(&self) -> LoginResponse {
        LoginResponse {
            token: self.token.as_str().to_string(),
            account: self.account.clone(),
            redirect_hint: self.redirect_hint,
        }
    }
}

/// The data required to register a new account.
#[derive(Debug, Clone)]
pub struct Registration {
    pub email: String,
    pub phone: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    pub role: Role,
}

pub struct LoginService<A: AccountRepository, R: AttemptRepository> {
    accounts: Arc<A>,
    recorder: Arc<AttemptRecorder<R>>,
    classifier: Arc<AbuseClassifier<R>>,
    rate_limiter: Arc<RateLimiter<R>>,
    tokens: Arc<TokenService<A>>,
    config: SecurityConfig,
}

impl<A: AccountRepository, R: AttemptRepository> LoginService<A, R> {
    pub fn new(
        accounts: Arc<A>,
        recorder: Arc<AttemptRecorder<R>>,
        classifier: Arc<AbuseClassifier<R>>,
        rate_limiter: Arc<RateLimiter<R>>,
        tokens: Arc<TokenService<A>>,
        config: SecurityConfig,
    ) -> Self {
        Self {
            accounts,
            recorder,
            classifier,
            rate_limiter,
            tokens,
            config,
        }
    }

    /// Register a new account.
    ///
    /// Validates identity and secret, rejects duplicates, and stores only
    /// the argon2 hash of the password.
    pub async fn register(&self, registration: Registration) -> Result<Account, Error> {
        validate_email(&registration.email)?;
        validate_phone(&registration.phone)?;
        validate_password(&registration.password)?;

        let email = normalize_email(&registration.email);
        if self.accounts.find_by_email(&email).await?.is_some() {
            return Err(Error::Auth(AuthError::AccountAlreadyExists));
        }
        if self
            .accounts
            .find_by_phone(&registration.phone)
            .await?
            .is_some()
        {
            return Err(Error::Auth(AuthError::AccountAlreadyExists));
        }

        let password_hash = password_auth::generate_hash(&registration.password);

        self.accounts
            .create(NewAccount::new(
                email,
                registration.phone,
                registration.first_name,
                registration.last_name,
                password_hash,
                registration.role,
            ))
            .await
    }

    /// Verify credentials and issue a token.
    ///
    /// Pipeline: rate limit → lookup → lockout → password comparison →
    /// token issuance, with one audit record and one classification per
    /// call regardless of outcome.
    pub async fn login(
        &self,
        request: LoginRequest,
        ctx: RequestContext,
    ) -> Result<LoginSuccess, LoginFailure> {
        let email = normalize_email(&request.identity);
        let now = Utc::now();

        // Rejected before any credential comparison. A locked account that
        // is also rate-limited surfaces the lock: it carries the more
        // precise retry time and the lock outlives the window.
        let decision = self
            .rate_limiter
            .check(&email, ctx.ip_address.as_deref())
            .await;
        if decision.limited {
            let account_id = match self.accounts.find_by_email(&email).await {
                Ok(Some(account)) if account.is_locked(now) => {
                    return Err(self.locked_failure(&email, &account, &ctx).await);
                }
                Ok(account) => account.map(|a| a.id),
                Err(e) => {
                    tracing::warn!(error = %e, "Account lookup failed during rate-limit rejection");
                    None
                }
            };
            self.record_failure(&email, account_id, FailureReason::RateLimited, &ctx)
                .await;
            let failure = match decision.reset_at {
                Some(reset_at) => {
                    LoginFailure::with_retry_after(FailureReason::RateLimited, reset_at)
                }
                None => LoginFailure::new(FailureReason::RateLimited),
            };
            return Err(failure);
        }

        let account = match self.accounts.find_by_email(&email).await {
            Ok(account) => account,
            Err(e) if e.is_validation_error() => {
                // Corrupted stored data (e.g. an unknown role) fails closed
                tracing::error!(error = %e, "Account record failed validation");
                self.record_failure(&email, None, FailureReason::ValidationError, &ctx)
                    .await;
                return Err(LoginFailure::new(FailureReason::ValidationError));
            }
            Err(e) => {
                tracing::error!(error = %e, "Credential store unavailable during login");
                self.record_failure(&email, None, FailureReason::ServerError, &ctx)
                    .await;
                return Err(LoginFailure::new(FailureReason::ServerError));
            }
        };

        let Some(account) = account else {
            // Recorded precisely, surfaced generically
            self.record_failure(&email, None, FailureReason::UserNotFound, &ctx)
                .await;
            return Err(LoginFailure::new(FailureReason::InvalidCredentials));
        };

        if account.is_locked(now) {
            return Err(self.locked_failure(&email, &account, &ctx).await);
        }

        // Lazy unlock: the lock expired, clear the stale counter before
        // evaluating this attempt.
        if account.lock_has_expired(now) {
            if let Err(e) = self.accounts.clear_expired_lock(&account.id).await {
                tracing::error!(error = %e, "Failed to clear expired lock");
                self.record_failure(
                    &email,
                    Some(account.id.clone()),
                    FailureReason::ServerError,
                    &ctx,
                )
                .await;
                return Err(LoginFailure::new(FailureReason::ServerError));
            }
        }

        if password_auth::verify_password(&request.secret, &account.password_hash).is_err() {
            return Err(self.handle_password_mismatch(&email, &account, &ctx).await);
        }

        if let Err(e) = self.accounts.record_login_success(&account.id, now).await {
            tracing::error!(error = %e, "Failed to reset lockout state on login");
            self.record_failure(
                &email,
                Some(account.id.clone()),
                FailureReason::ServerError,
                &ctx,
            )
            .await;
            return Err(LoginFailure::new(FailureReason::ServerError));
        }

        let (token, claims) = match self.tokens.issue(&account) {
            Ok(issued) => issued,
            Err(e) => {
                tracing::error!(error = %e, "Token issuance failed");
                self.record_failure(
                    &email,
                    Some(account.id.clone()),
                    FailureReason::ServerError,
                    &ctx,
                )
                .await;
                return Err(LoginFailure::new(FailureReason::ServerError));
            }
        };

        let recorded = self
            .record_and_classify(NewLoginAttempt::success(
                email,
                account.id.clone(),
                ctx.ip_address.clone(),
                ctx.user_agent.clone(),
            ))
            .await;

        let lifetime_secs = self.tokens.codec().lifetime().num_seconds();
        Ok(LoginSuccess {
            cookie: CookieOptions::for_token(token.as_str(), lifetime_secs),
            redirect_hint: RedirectHint::for_account(account.role, account.has_access),
            account: AccountSnapshot::from(&account),
            attempt_id: recorded.map(|a| a.id),
            token,
            claims,
        })
    }

    /// Record an attempt against a currently locked account and build the
    /// failure carrying the lock expiry.
    async fn locked_failure(
        &self,
        email: &str,
        account: &Account,
        ctx: &RequestContext,
    ) -> LoginFailure {
        self.record_failure(
            email,
            Some(account.id.clone()),
            FailureReason::AccountLocked,
            ctx,
        )
        .await;
        match account.lock_until {
            Some(until) => LoginFailure::with_retry_after(FailureReason::AccountLocked, until),
            None => LoginFailure::new(FailureReason::AccountLocked),
        }
    }

    /// Apply the atomic failure increment and decide what to surface.
    ///
    /// When the increment itself transitions the account into the locked
    /// state, the caller sees `AccountLocked` with a retry hint; the audit
    /// row still records the credentials as the failure.
    async fn handle_password_mismatch(
        &self,
        email: &str,
        account: &Account,
        ctx: &RequestContext,
    ) -> LoginFailure {
        let lock_until = Utc::now() + self.config.lockout_duration;
        let updated = match self
            .accounts
            .record_login_failure(email, self.config.lockout_threshold, lock_until)
            .await
        {
            Ok(updated) => updated,
            Err(e) => {
                tracing::error!(error = %e, "Failed to record login failure");
                self.record_failure(
                    email,
                    Some(account.id.clone()),
                    FailureReason::ServerError,
                    ctx,
                )
                .await;
                return LoginFailure::new(FailureReason::ServerError);
            }
        };

        self.record_failure(
            email,
            Some(account.id.clone()),
            FailureReason::InvalidCredentials,
            ctx,
        )
        .await;

        match updated {
            Some(updated) if updated.is_locked(Utc::now()) => {
                tracing::warn!(
                    email = %email,
                    failed_attempts = updated.failed_login_attempts,
                    "Account locked after repeated failed logins"
                );
                let until = updated.lock_until.unwrap_or(lock_until);
                LoginFailure::with_retry_after(FailureReason::AccountLocked, until)
            }
            _ => LoginFailure::new(FailureReason::InvalidCredentials),
        }
    }

    async fn record_failure(
        &self,
        email: &str,
        account_id: Option<AccountId>,
        reason: FailureReason,
        ctx: &RequestContext,
    ) -> Option<LoginAttempt> {
        self.record_and_classify(NewLoginAttempt::failure(
            email.to_string(),
            account_id,
            reason,
            ctx.ip_address.clone(),
            ctx.user_agent.clone(),
        ))
        .await
    }

    async fn record_and_classify(&self, attempt: NewLoginAttempt) -> Option<LoginAttempt> {
        let recorded = self.recorder.record(attempt).await?;
        self.classifier.classify(&recorded).await;
        Some(recorded)
    }
}

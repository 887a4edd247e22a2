//! # Warden
//!
//! Warden is the authentication and abuse-detection layer for applications
//! that own their user data: password verification with automatic account
//! lockout, sliding-window rate limiting, an append-only login audit trail
//! with heuristic abuse classification, and stateless signed tokens with
//! silent renewal.
//!
//! The [`Warden`] coordinator wires the `warden-core` services over any
//! storage backend implementing
//! [`RepositoryProvider`](warden_core::repositories::RepositoryProvider).
//! SQLite support ships behind the `sqlite` feature (on by default).
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use warden::{LoginRequest, RequestContext, SqliteRepositoryProvider, TokenConfig, Warden};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let repositories = Arc::new(SqliteRepositoryProvider::connect("sqlite::memory:").await?);
//!     let warden = Warden::new(repositories, TokenConfig::new(b"a-server-held-secret".to_vec()));
//!     warden.migrate().await?;
//!
//!     let request = LoginRequest {
//!         identity: "user@example.com".to_string(),
//!         secret: "their-password".to_string(),
//!     };
//!     let ctx = RequestContext::new(Some("203.0.113.9".to_string()), None);
//!     match warden.login(request, ctx).await {
//!         Ok(success) => println!("token: {}", success.token),
//!         Err(failure) => println!("rejected: {failure}"),
//!     }
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use warden_core::repositories::{AccountRepository, RepositoryProvider};
use warden_core::services::{
    AbuseClassifier, AttemptRecorder, AuditService, LoginService, RateLimiter, TokenService,
};

/// Re-export core types from warden_core
///
/// These types are commonly used when working with the Warden API.
pub use warden_core::error;
pub use warden_core::{
    Account, AccountId, AccountSnapshot, AttemptFilter, AttemptPage, AuthSession, AuthToken,
    Claims, CookieOptions, DailyAttemptStats, DeviceInfo, Error, FailureReason, FailureResponse,
    LoginAttempt, LoginFailure, LoginRequest, LoginResponse, RedirectHint, RequestContext, Role,
    SecurityConfig, SessionState, SuspiciousReason, TokenConfig,
};
pub use warden_core::services::{
    AuditReport, GeoResolver, LoginSuccess, RefreshedSession, Registration,
};

/// Re-export storage backends
#[cfg(feature = "sqlite")]
pub use warden_storage_sqlite::SqliteRepositoryProvider;

/// The main coordinator wiring the login pipeline over a storage backend.
pub struct Warden<R: RepositoryProvider> {
    repositories: Arc<R>,
    logins: Arc<LoginService<R::Accounts, R::Attempts>>,
    tokens: Arc<TokenService<R::Accounts>>,
    recorder: Arc<AttemptRecorder<R::Attempts>>,
    audit: Arc<AuditService<R::Attempts>>,
    token_config: TokenConfig,
}

impl<R: RepositoryProvider> Warden<R> {
    /// Create a coordinator with the default security policy.
    pub fn new(repositories: Arc<R>, token_config: TokenConfig) -> Self {
        Self::with_config(repositories, token_config, SecurityConfig::default())
    }

    /// Create a coordinator with an explicit security policy.
    pub fn with_config(
        repositories: Arc<R>,
        token_config: TokenConfig,
        security: SecurityConfig,
    ) -> Self {
        Self::build(repositories, token_config, security, None)
    }

    /// Like [`Warden::with_config`], with a geolocation resolver wired into
    /// the abuse classifier.
    pub fn with_geo_resolver(
        repositories: Arc<R>,
        token_config: TokenConfig,
        security: SecurityConfig,
        geo: Arc<dyn GeoResolver>,
    ) -> Self {
        Self::build(repositories, token_config, security, Some(geo))
    }

    fn build(
        repositories: Arc<R>,
        token_config: TokenConfig,
        security: SecurityConfig,
        geo: Option<Arc<dyn GeoResolver>>,
    ) -> Self {
        let accounts = repositories.accounts();
        let attempts = repositories.attempts();

        let recorder = Arc::new(AttemptRecorder::new(attempts.clone()));
        let classifier = Arc::new(match geo {
            Some(geo) => AbuseClassifier::with_geo_resolver(attempts.clone(), &security, geo),
            None => AbuseClassifier::new(attempts.clone(), &security),
        });
        let rate_limiter = Arc::new(RateLimiter::new(attempts.clone(), &security));
        let tokens = Arc::new(TokenService::new(accounts.clone(), token_config.clone()));
        let logins = Arc::new(LoginService::new(
            accounts,
            recorder.clone(),
            classifier,
            rate_limiter,
            tokens.clone(),
            security.clone(),
        ));
        let audit = Arc::new(AuditService::new(attempts, &security));

        Self {
            repositories,
            logins,
            tokens,
            recorder,
            audit,
            token_config,
        }
    }

    /// Run any pending schema migrations on the storage backend.
    pub async fn migrate(&self) -> Result<(), Error> {
        self.repositories.migrate().await
    }

    /// Check storage connectivity.
    pub async fn health_check(&self) -> Result<(), Error> {
        self.repositories.health_check().await
    }

    /// Register a new account. The password is stored as an argon2 hash.
    pub async fn register(&self, registration: Registration) -> Result<Account, Error> {
        self.logins.register(registration).await
    }

    /// Run the full login pipeline: rate limit, credential verification,
    /// lockout, audit recording, abuse classification, token issuance.
    pub async fn login(
        &self,
        request: LoginRequest,
        ctx: RequestContext,
    ) -> Result<LoginSuccess, LoginFailure> {
        self.logins.login(request, ctx).await
    }

    /// Strict token verification for protected-resource access.
    pub fn verify_token(&self, token: &AuthToken) -> Result<Claims, Error> {
        self.tokens.verify(token)
    }

    /// Exchange a current (possibly just-expired) token for a fresh one,
    /// re-resolving the account state.
    pub async fn refresh_token(&self, token: &AuthToken) -> Result<RefreshedSession, Error> {
        self.tokens.refresh(token).await
    }

    /// Create a session object for a freshly issued token and arm its
    /// silent-renewal timer.
    pub fn start_session(&self, token: AuthToken, claims: Claims) -> AuthSession {
        let session = AuthSession::new(self.token_config.refresh_lead);
        session.start(self.tokens.clone(), token, claims);
        session
    }

    pub async fn account(&self, id: &AccountId) -> Result<Option<Account>, Error> {
        self.repositories.accounts().find_by_id(id).await
    }

    /// Grant or revoke the content-access flag, recording the actor.
    pub async fn set_access(
        &self,
        id: &AccountId,
        granted: bool,
        changed_by: &AccountId,
    ) -> Result<(), Error> {
        tracing::info!(account = %id, granted, changed_by = %changed_by, "Access changed");
        self.repositories
            .accounts()
            .set_access(id, granted, changed_by)
            .await
    }

    /// Administrative audit query: a filtered page of attempt records plus
    /// daily success/failure counts.
    pub async fn audit(&self, filter: &AttemptFilter) -> Result<AuditReport, Error> {
        self.audit.query(filter).await
    }

    /// Back-fill the session duration onto a login's audit record.
    pub async fn close_session(&self, attempt_id: i64, duration_secs: i64) -> Result<(), Error> {
        self.audit.close_session(attempt_id, duration_secs).await
    }

    /// Delete audit records older than the retention period.
    pub async fn purge_expired_attempts(&self) -> Result<u64, Error> {
        self.audit.purge_expired().await
    }

    /// Spawn the periodic audit retention task; it stops when `shutdown`
    /// flips to true.
    pub fn start_retention_task(
        &self,
        interval: std::time::Duration,
        shutdown: tokio::sync::watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        self.audit.start_retention_task(interval, shutdown)
    }

    /// Number of audit records dropped due to storage failures.
    pub fn dropped_audit_records(&self) -> u64 {
        self.recorder.dropped_records()
    }
}

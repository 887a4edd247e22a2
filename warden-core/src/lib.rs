//! Core functionality for the warden project
//!
//! This crate contains the authentication and abuse-detection core: the
//! account and login-attempt types, the repository traits a storage backend
//! implements, and the services composing them into the login pipeline.
//!
//! It is storage-agnostic. Backends implement [`RepositoryProvider`] (see
//! the `warden-storage-sqlite` crate for the SQLite implementation) and the
//! `warden` facade wires the services together for application code.
//!
//! See [`Account`] for the credential-store record, [`LoginAttempt`] for
//! the audit record, and [`services`] for the pipeline itself.

pub mod account;
pub mod api;
pub mod attempt;
pub mod config;
pub mod device;
pub mod error;
pub mod id;
pub mod repositories;
pub mod services;
pub mod session;
pub mod token;
pub mod validation;

pub use account::{Account, AccountBuilder, AccountId, NewAccount, Role};
pub use api::{
    AccountSnapshot, CookieOptions, FailureResponse, LoginRequest, LoginResponse, RedirectHint,
    RequestContext,
};
pub use attempt::{
    AttemptFilter, AttemptPage, DailyAttemptStats, LoginAttempt, NewLoginAttempt,
    SuspiciousReason,
};
pub use config::{SecurityConfig, TokenConfig};
pub use device::DeviceInfo;
pub use error::{Error, FailureReason, LoginFailure};
pub use repositories::{AccountRepository, AttemptRepository, RepositoryProvider};
pub use session::{AuthSession, Renew, SessionState, refresh_delay};
pub use token::{AuthToken, Claims, TokenCodec};

//! Client-side session state and silent token renewal.
//!
//! An [`AuthSession`] is an explicit per-session object handed through the
//! call chain, never a process-wide singleton. It arms a single-shot timer
//! that fires one hour before token expiry, exchanges the token via a
//! [`Renew`] implementation, and re-arms. At most one refresh is in flight
//! at a time; a refresh in progress suppresses re-arming until it resolves.
//!
//! Any renewal failure transitions to [`SessionState::LoggedOut`]: the
//! token is discarded and fresh credential verification is required.
//! Logout cancels the pending timer synchronously before clearing the
//! stored credentials, so a late-resolving refresh can never
//! re-authenticate a session the user already ended.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::{
    Error,
    repositories::AccountRepository,
    services::token::TokenService,
    token::{AuthToken, Claims},
};

/// How long to wait before silently renewing a token: the time remaining
/// until expiry minus the lead, floored at zero so an already-due token
/// renews immediately.
pub fn refresh_delay(
    expires_at: DateTime<Utc>,
    now: DateTime<Utc>,
    lead: Duration,
) -> std::time::Duration {
    (expires_at - now - lead)
        .to_std()
        .unwrap_or(std::time::Duration::ZERO)
}

/// Exchanges a current token for a fresh one.
#[async_trait]
pub trait Renew: Send + Sync + 'static {
    async fn renew(&self, token: &AuthToken) -> Result<(AuthToken, Claims), Error>;
}

#[async_trait]
impl<A: AccountRepository> Renew for TokenService<A> {
    async fn renew(&self, token: &AuthToken) -> Result<(AuthToken, Claims), Error> {
        let refreshed = self.refresh(token).await?;
        Ok((refreshed.token, refreshed.claims))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Unissued,
    Valid { token: AuthToken, claims: Claims },
    Refreshing { claims: Claims },
    LoggedOut,
}

impl SessionState {
    pub fn is_logged_out(&self) -> bool {
        matches!(self, SessionState::LoggedOut)
    }
}

/// One authenticated session and its renewal loop.
pub struct AuthSession {
    state: Arc<Mutex<SessionState>>,
    refresh_lead: Duration,
    cancel: watch::Sender<bool>,
}

impl AuthSession {
    pub fn new(refresh_lead: Duration) -> Self {
        let (cancel, _) = watch::channel(false);
        Self {
            state: Arc::new(Mutex::new(SessionState::Unissued)),
            refresh_lead,
            cancel,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// The current bearer token, if the session is valid.
    pub fn token(&self) -> Option<AuthToken> {
        match self.state() {
            SessionState::Valid { token, .. } => Some(token),
            _ => None,
        }
    }

    /// Store a freshly issued token and spawn the renewal loop.
    pub fn start(&self, renewer: Arc<dyn Renew>, token: AuthToken, claims: Claims) -> JoinHandle<()> {
        {
            let mut state = self
                .state
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            *state = SessionState::Valid { token, claims };
        }

        let state = Arc::clone(&self.state);
        let cancel = self.cancel.subscribe();
        let lead = self.refresh_lead;
        tokio::spawn(renewal_loop(state, renewer, cancel, lead))
    }

    /// End the session: cancel the pending renewal timer, then discard the
    /// stored credentials.
    pub fn logout(&self) {
        let _ = self.cancel.send(true);
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *state = SessionState::LoggedOut;
        tracing::debug!("Session logged out");
    }
}

async fn renewal_loop(
    state: Arc<Mutex<SessionState>>,
    renewer: Arc<dyn Renew>,
    mut cancel: watch::Receiver<bool>,
    lead: Duration,
) {
    loop {
        let expires_at = {
            let state = state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            match &*state {
                SessionState::Valid { claims, .. } => claims.expires_at(),
                _ => return,
            }
        };

        let delay = refresh_delay(expires_at, Utc::now(), lead);
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = cancel.changed() => {
                if *cancel.borrow() {
                    return;
                }
                continue;
            }
        }

        // Take the token and mark the refresh in flight; re-arming is
        // suppressed until it resolves.
        let current = {
            let mut state = state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            match state.clone() {
                SessionState::Valid { token, claims } => {
                    *state = SessionState::Refreshing { claims };
                    token
                }
                _ => return,
            }
        };

        match renewer.renew(&current).await {
            Ok((token, claims)) => {
                let mut state = state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                // A logout that raced the in-flight refresh wins
                if matches!(&*state, SessionState::Refreshing { .. }) {
                    tracing::debug!(expires_at = claims.exp, "Session token renewed");
                    *state = SessionState::Valid { token, claims };
                } else {
                    return;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Token renewal failed, logging session out");
                let mut state = state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                if matches!(&*state, SessionState::Refreshing { .. }) {
                    *state = SessionState::LoggedOut;
                }
                return;
            }
        }
    }
}

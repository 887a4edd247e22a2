//! Token lifecycle service: issuance, verification, refresh.
//!
//! A refresh produces an entirely new token with a fresh expiry, signed
//! the same way; tokens are never repaired. The refresh path accepts a
//! just-expired token (grace decode, signature still checked) but must
//! re-resolve the account from the credential store: a purely claims-based
//! refresh would let a locked or deleted account keep renewing on stale
//! claims.

use std::sync::Arc;

use crate::{
    Error,
    account::Account,
    config::TokenConfig,
    error::{AuthError, TokenError},
    repositories::AccountRepository,
    token::{AuthToken, Claims, TokenCodec},
};

/// A freshly minted token together with the account state it was minted
/// from.
#[derive(Debug, Clone)]
pub struct RefreshedSession {
    pub token: AuthToken,
    pub claims: Claims,
    pub account: Account,
}

pub struct TokenService<A: AccountRepository> {
    codec: TokenCodec,
    accounts: Arc<A>,
}

impl<A: AccountRepository> TokenService<A> {
    pub fn new(accounts: Arc<A>, config: TokenConfig) -> Self {
        Self {
            codec: TokenCodec::new(config),
            accounts,
        }
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Mint a token for a verified account.
    pub fn issue(&self, account: &Account) -> Result<(AuthToken, Claims), Error> {
        self.codec.issue(account)
    }

    /// Strict verification for protected-resource access.
    pub fn verify(&self, token: &AuthToken) -> Result<Claims, Error> {
        self.codec.verify(token)
    }

    /// Exchange a current (possibly just-expired) token for a new one.
    ///
    /// Fails with `InvalidToken` if the account no longer resolves and
    /// with `AccountLocked` if it was locked since issuance.
    pub async fn refresh(&self, token: &AuthToken) -> Result<RefreshedSession, Error> {
        let claims = self.codec.decode_expired(token)?;

        let account = self
            .accounts
            .find_by_id(&claims.account_id())
            .await?
            .ok_or_else(|| {
                Error::Token(TokenError::Invalid(
                    "Account no longer resolves".to_string(),
                ))
            })?;

        let now = chrono::Utc::now();
        if account.is_locked(now) {
            return Err(Error::Auth(AuthError::AccountLocked {
                until: account.lock_until,
            }));
        }

        // Claims come from current account state, picking up any role or
        // access changes since the previous issuance.
        let (token, claims) = self.codec.issue(&account)?;
        Ok(RefreshedSession {
            token,
            claims,
            account,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::{Account, AccountId, Role};
    use crate::services::support::MemoryAccountRepository;
    use chrono::{Duration, Utc};

    const TEST_SECRET: &[u8] = b"test_secret_key_for_hs256_tokens_not_for_production_use";

    fn account_with(email: &str) -> Account {
        Account::builder()
            .email(email.to_string())
            .phone("+15550001111".to_string())
            .password_hash("hash".to_string())
            .role(Role::Student)
            .has_access(true)
            .build()
            .unwrap()
    }

    fn service(repo: Arc<MemoryAccountRepository>) -> TokenService<MemoryAccountRepository> {
        TokenService::new(repo, TokenConfig::new(TEST_SECRET.to_vec()))
    }

    #[tokio::test]
    async fn test_refresh_issues_new_token_from_current_state() {
        let repo = Arc::new(MemoryAccountRepository::new());
        let account = account_with("a@x.com");
        repo.insert_account(account.clone());

        let service = service(repo.clone());
        let (token, original_claims) = service.issue(&account).unwrap();

        // Grant changes between issuance and refresh
        repo.set_access(&account.id, false, &AccountId::new_random())
            .await
            .unwrap();

        let refreshed = service.refresh(&token).await.unwrap();
        assert_ne!(refreshed.token, token);
        assert_eq!(refreshed.claims.sub, original_claims.sub);
        assert!(!refreshed.claims.has_access);
        assert!(refreshed.claims.exp >= original_claims.exp);
    }

    #[tokio::test]
    async fn test_refresh_accepts_just_expired_token() {
        let repo = Arc::new(MemoryAccountRepository::new());
        let account = account_with("a@x.com");
        repo.insert_account(account.clone());

        let expired_codec = TokenCodec::new(
            TokenConfig::new(TEST_SECRET.to_vec()).with_lifetime(Duration::seconds(-5)),
        );
        let (expired_token, _) = expired_codec.issue(&account).unwrap();

        let service = service(repo);
        assert!(service.verify(&expired_token).is_err());

        let refreshed = service.refresh(&expired_token).await.unwrap();
        assert!(service.verify(&refreshed.token).is_ok());
    }

    #[tokio::test]
    async fn test_refresh_fails_for_locked_account() {
        let repo = Arc::new(MemoryAccountRepository::new());
        let mut account = account_with("a@x.com");
        let service_ref = service(repo.clone());
        let (token, _) = service_ref.issue(&account).unwrap();

        // Locked between issuance and refresh
        account.lock_until = Some(Utc::now() + Duration::hours(2));
        repo.insert_account(account);

        let result = service_ref.refresh(&token).await;
        assert!(matches!(
            result,
            Err(Error::Auth(AuthError::AccountLocked { until: Some(_) }))
        ));
    }

    #[tokio::test]
    async fn test_refresh_fails_when_account_gone() {
        let repo = Arc::new(MemoryAccountRepository::new());
        let account = account_with("a@x.com");

        let service = service(repo);
        let (token, _) = service.issue(&account).unwrap();

        // Account never stored: refresh must not succeed on claims alone
        let result = service.refresh(&token).await;
        assert!(matches!(
            result,
            Err(Error::Token(TokenError::Invalid(_)))
        ));
    }
}

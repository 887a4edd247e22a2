//! Signed token issuance and verification.
//!
//! Tokens are stateless HS256 JWTs carrying the account snapshot the
//! protected layer needs. Verification is a pure function of the token and
//! the server secret; the `role`/`has_access` claims may therefore be
//! stale relative to the credential store, bounded by the token lifetime.
//! The refresh path closes that gap by re-resolving the account.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
    errors::ErrorKind,
};
use serde::{Deserialize, Serialize};

use crate::{
    account::{Account, AccountId, Role},
    config::TokenConfig,
    error::{Error, TokenError},
};

/// An encoded, signed token. Treated as opaque by callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthToken(String);

impl AuthToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for AuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Claims carried by every issued token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Account id.
    pub sub: String,

    pub email: String,

    pub role: Role,

    pub has_access: bool,

    /// Issued-at, unix seconds.
    pub iat: i64,

    /// Expiry, unix seconds.
    pub exp: i64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

impl Claims {
    pub fn account_id(&self) -> AccountId {
        AccountId::new(&self.sub)
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.iat, 0).unwrap_or_else(Utc::now)
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or_else(Utc::now)
    }
}

/// Encodes and verifies signed tokens with a server-held secret.
#[derive(Clone)]
pub struct TokenCodec {
    config: TokenConfig,
}

impl TokenCodec {
    pub fn new(config: TokenConfig) -> Self {
        Self { config }
    }

    pub fn lifetime(&self) -> Duration {
        self.config.lifetime
    }

    pub fn refresh_lead(&self) -> Duration {
        self.config.refresh_lead
    }

    /// Mint a token for a verified account with a fresh expiry.
    pub fn issue(&self, account: &Account) -> Result<(AuthToken, Claims), Error> {
        let now = Utc::now();
        let claims = Claims {
            sub: account.id.as_str().to_string(),
            email: account.email.clone(),
            role: account.role,
            has_access: account.has_access,
            iat: now.timestamp(),
            exp: (now + self.config.lifetime).timestamp(),
            iss: self.config.issuer.clone(),
        };

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(&self.config.secret),
        )
        .map_err(|e| Error::Token(TokenError::Signing(e.to_string())))?;

        Ok((AuthToken(token), claims))
    }

    /// Strict verification: signature, expiry, and issuer when configured.
    pub fn verify(&self, token: &AuthToken) -> Result<Claims, Error> {
        self.decode(token, true)
    }

    /// Grace decode for the refresh path: the signature is still checked,
    /// but an expired token is accepted.
    pub fn decode_expired(&self, token: &AuthToken) -> Result<Claims, Error> {
        self.decode(token, false)
    }

    fn decode(&self, token: &AuthToken, validate_exp: bool) -> Result<Claims, Error> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = validate_exp;
        if let Some(issuer) = &self.config.issuer {
            validation.set_issuer(&[issuer]);
        }

        let data = decode::<Claims>(
            token.as_str(),
            &DecodingKey::from_secret(&self.config.secret),
            &validation,
        )
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => Error::Token(TokenError::Expired),
            _ => Error::Token(TokenError::Invalid(e.to_string())),
        })?;

        Ok(data.claims)
    }
}

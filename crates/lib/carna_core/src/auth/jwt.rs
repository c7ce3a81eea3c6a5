//! JWT token issuance and verification.
//!
//! Access and refresh tokens share one claim shape and differ only in the
//! secret, lifetime and `kind` claim. Verification is pure: no store access.

use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use thiserror::Error;
use uuid::Uuid;

use super::config::AuthConfig;
use crate::models::auth::{TokenClaims, TokenKind, User};

/// Token codec failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("invalid signature")]
    InvalidSignature,

    #[error("token expired")]
    Expired,

    #[error("expected a {expected} token, got a {found} token")]
    WrongKind { expected: TokenKind, found: TokenKind },

    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("jwt encode: {0}")]
    Encode(String),
}

/// Sign a token of `kind` for `user`, valid for `ttl` from now.
pub fn issue_token(
    kind: TokenKind,
    user: &User,
    secret: &[u8],
    ttl: Duration,
) -> Result<String, TokenError> {
    let ttl = chrono::Duration::from_std(ttl)
        .map_err(|e| TokenError::Encode(format!("ttl out of range: {e}")))?;
    let now = Utc::now();
    let claims = TokenClaims {
        sub: user.id.to_string(),
        username: user.username.clone(),
        first_name: user.first_name.clone(),
        last_name: user.last_name.clone(),
        role: user.role,
        kind,
        jti: Uuid::new_v4().to_string(),
        exp: (now + ttl).timestamp(),
        iat: now.timestamp(),
    };
    encode_claims(&claims, secret)
}

/// Sign arbitrary claims (HS256).
pub fn encode_claims(claims: &TokenClaims, secret: &[u8]) -> Result<String, TokenError> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret),
    )
    .map_err(|e| TokenError::Encode(e.to_string()))
}

/// Verify signature and expiry, returning the claims on success.
pub fn verify_token(token: &str, secret: &[u8]) -> Result<TokenClaims, TokenError> {
    decode::<TokenClaims>(token, &DecodingKey::from_secret(secret), &validation())
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidSignature => TokenError::InvalidSignature,
            _ => TokenError::Malformed(e.to_string()),
        })
}

fn validation() -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation.validate_exp = true;
    validation.set_required_spec_claims(&["exp", "sub"]);
    validation
}

/// Issues and verifies both token kinds with their own secret and lifetime.
#[derive(Clone)]
pub struct TokenCodec {
    access_secret: Vec<u8>,
    refresh_secret: Vec<u8>,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenCodec {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            access_secret: config.access_secret.as_bytes().to_vec(),
            refresh_secret: config.refresh_secret.as_bytes().to_vec(),
            access_ttl: config.access_ttl,
            refresh_ttl: config.refresh_ttl,
        }
    }

    pub fn ttl(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        }
    }

    fn secret(&self, kind: TokenKind) -> &[u8] {
        match kind {
            TokenKind::Access => &self.access_secret,
            TokenKind::Refresh => &self.refresh_secret,
        }
    }

    /// Issue a token of `kind` for `user`.
    pub fn issue(&self, kind: TokenKind, user: &User) -> Result<String, TokenError> {
        issue_token(kind, user, self.secret(kind), self.ttl(kind))
    }

    /// Verify a token against the secret for `kind` and check its `kind` claim.
    pub fn verify(&self, kind: TokenKind, token: &str) -> Result<TokenClaims, TokenError> {
        let claims = verify_token(token, self.secret(kind))?;
        if claims.kind != kind {
            return Err(TokenError::WrongKind {
                expected: kind,
                found: claims.kind,
            });
        }
        Ok(claims)
    }
}

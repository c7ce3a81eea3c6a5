//! Authentication and session logic.
//!
//! Provides password hashing, the token codec, the credential store
//! abstraction and the session manager that drives login, refresh and
//! logout. Shared by `carna_api` and `carna_cli`.

pub mod accounts;
pub mod config;
pub mod jwt;
pub mod memory;
pub mod password;
pub mod queries;
pub mod session;
pub mod store;

use thiserror::Error;

use self::jwt::TokenError;
use self::store::StoreError;

/// Authentication errors.
///
/// Each variant is one kind of the session taxonomy; the API layer maps
/// them to HTTP statuses without inspecting messages.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account is disabled")]
    AccountDisabled,

    #[error("Refresh token missing")]
    MissingRefreshToken,

    #[error("Invalid refresh token: {0}")]
    InvalidRefreshToken(TokenError),

    #[error("Refresh token subject not found")]
    UnknownSubject,

    #[error("Refresh token is not valid")]
    SessionRevoked,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Token error: {0}")]
    Token(TokenError),

    #[error("Store error: {0}")]
    Store(StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict(msg) => AuthError::Conflict(msg),
            other => AuthError::Store(other),
        }
    }
}

impl AuthError {
    /// Stable label for structured logs.
    pub fn reason(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::AccountDisabled => "account_disabled",
            AuthError::MissingRefreshToken => "missing_refresh_token",
            AuthError::InvalidRefreshToken(_) => "invalid_refresh_token",
            AuthError::UnknownSubject => "unknown_subject",
            AuthError::SessionRevoked => "session_revoked",
            AuthError::Validation(_) => "validation",
            AuthError::Conflict(_) => "conflict",
            AuthError::Token(_) => "token",
            AuthError::Store(_) => "store",
            AuthError::Internal(_) => "internal",
        }
    }
}

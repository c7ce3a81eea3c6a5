//! Session manager: login, refresh rotation and logout.
//!
//! A user is either without a session (no stored refresh hash) or has
//! exactly one live refresh token whose SHA-256 is stored on the record.
//! Refresh verifies the presented token before reading any of its claims,
//! and commits rotation through [`CredentialStore::swap_refresh_hash`].

use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::AuthError;
use super::config::AuthConfig;
use super::jwt::{TokenCodec, TokenError};
use super::password::{hash_password_blocking, hash_refresh_token, verify_password_blocking};
use super::store::CredentialStore;
use crate::models::auth::{TokenKind, User};

const DECOY_PASSWORD: &str = "carna-decoy-password";

/// Tokens and profile returned by a successful login or refresh.
#[derive(Debug, Clone)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub user: User,
}

/// Drives the per-user session state transitions.
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn CredentialStore>,
    codec: TokenCodec,
    bcrypt_cost: u32,
    /// Hash checked against when the username is unknown, so both branches
    /// pay for one bcrypt verification.
    decoy_hash: Arc<OnceCell<String>>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn CredentialStore>, config: &AuthConfig) -> Self {
        Self {
            store,
            codec: TokenCodec::new(config),
            bcrypt_cost: config.bcrypt_cost,
            decoy_hash: Arc::new(OnceCell::new()),
        }
    }

    /// Codec used for access-token verification by the transport layer.
    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    /// Authenticate with username and password and start a new session.
    ///
    /// Any previous refresh token for the user stops working.
    pub async fn login(&self, username: &str, password: &str) -> Result<Session, AuthError> {
        let Some(record) = self.store.find_by_username(username).await? else {
            let decoy = self
                .decoy_hash
                .get_or_try_init(|| hash_password_blocking(DECOY_PASSWORD.into(), self.bcrypt_cost))
                .await?;
            verify_password_blocking(password.to_string(), decoy.clone()).await?;
            warn!(username, reason = "unknown_username", "login rejected");
            return Err(AuthError::InvalidCredentials);
        };

        let matches =
            verify_password_blocking(password.to_string(), record.password_hash.clone()).await?;
        if !matches {
            warn!(user_id = %record.user.id, reason = "bad_password", "login rejected");
            return Err(AuthError::InvalidCredentials);
        }

        if !record.user.is_active {
            warn!(user_id = %record.user.id, reason = "account_disabled", "login rejected");
            return Err(AuthError::AccountDisabled);
        }

        let session = self.issue(record.user)?;
        self.store
            .set_refresh_hash(session.user.id, Some(&hash_refresh_token(&session.refresh_token)))
            .await?;
        info!(user_id = %session.user.id, "login succeeded");
        Ok(session)
    }

    /// Exchange a refresh token for a new token pair, rotating the stored hash.
    ///
    /// Once the token's subject is known, any failure clears the stored hash
    /// so the user has to log in again.
    pub async fn refresh(&self, presented: Option<&str>) -> Result<Session, AuthError> {
        let token = match presented {
            Some(t) if !t.trim().is_empty() => t,
            _ => {
                debug!(reason = "missing_refresh_token", "refresh rejected");
                return Err(AuthError::MissingRefreshToken);
            }
        };

        let claims = self
            .codec
            .verify(TokenKind::Refresh, token)
            .map_err(|e| {
                warn!(reason = "invalid_refresh_token", error = %e, "refresh rejected");
                AuthError::InvalidRefreshToken(e)
            })?;
        let Some(user_id) = claims.user_id() else {
            warn!(reason = "invalid_refresh_token", "refresh subject is not a user id");
            return Err(AuthError::InvalidRefreshToken(TokenError::Malformed(
                "subject is not a user id".into(),
            )));
        };

        match self.rotate(user_id, token).await {
            Ok(session) => {
                debug!(user_id = %user_id, "refresh rotated");
                Ok(session)
            }
            Err(err) => {
                warn!(user_id = %user_id, reason = err.reason(), "refresh rejected, revoking session");
                if let Err(clear) = self.store.set_refresh_hash(user_id, None).await {
                    warn!(user_id = %user_id, error = %clear, "failed to clear refresh hash");
                }
                Err(err)
            }
        }
    }

    async fn rotate(&self, user_id: Uuid, token: &str) -> Result<Session, AuthError> {
        let record = self
            .store
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UnknownSubject)?;
        let Some(stored) = record.refresh_token_hash.as_deref() else {
            return Err(AuthError::SessionRevoked);
        };
        let presented = hash_refresh_token(token);
        if presented != stored {
            return Err(AuthError::SessionRevoked);
        }
        if !record.user.is_active {
            return Err(AuthError::AccountDisabled);
        }

        let session = self.issue(record.user)?;
        let next = hash_refresh_token(&session.refresh_token);
        if !self
            .store
            .swap_refresh_hash(user_id, &presented, &next)
            .await?
        {
            return Err(AuthError::SessionRevoked);
        }
        Ok(session)
    }

    /// End the user's session. Idempotent.
    pub async fn logout(&self, user_id: Uuid) -> Result<(), AuthError> {
        self.store.set_refresh_hash(user_id, None).await?;
        info!(user_id = %user_id, "logout");
        Ok(())
    }

    fn issue(&self, user: User) -> Result<Session, AuthError> {
        let access_token = self
            .codec
            .issue(TokenKind::Access, &user)
            .map_err(AuthError::Token)?;
        let refresh_token = self
            .codec
            .issue(TokenKind::Refresh, &user)
            .map_err(AuthError::Token)?;
        Ok(Session {
            access_token,
            refresh_token,
            user,
        })
    }
}

//! Authentication middleware: Bearer token extraction and JWT verification.

use axum::http::header::AUTHORIZATION;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use carna_core::models::auth::{Role, TokenClaims, TokenKind};
use tracing::debug;
use uuid::Uuid;

use crate::AppState;
use crate::error::AppError;

/// Verified access-token claims, stored in request extensions.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub TokenClaims);

impl AuthenticatedUser {
    pub fn user_id(&self) -> Result<Uuid, AppError> {
        self.0
            .user_id()
            .ok_or_else(|| AppError::Unauthorized("Invalid or expired token".into()))
    }

    pub fn role(&self) -> Role {
        self.0.role
    }

    /// Fail with 403 unless the caller has one of `roles`.
    pub fn require_role(&self, roles: &[Role]) -> Result<(), AppError> {
        if roles.contains(&self.0.role) {
            Ok(())
        } else {
            Err(AppError::Forbidden("Insufficient role".into()))
        }
    }

    /// Admins may act on anyone; other users only on themselves.
    pub fn require_admin_or_self(&self, target: Uuid) -> Result<(), AppError> {
        if self.0.role == Role::Admin || self.user_id()? == target {
            Ok(())
        } else {
            Err(AppError::Forbidden("Insufficient role".into()))
        }
    }
}

/// Axum middleware: extracts `Authorization: Bearer <token>`, verifies it as
/// an access token and injects `AuthenticatedUser` into request extensions.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing authorization header".into()))?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Unauthorized("Invalid authorization scheme".into()))?;

    let claims = state
        .sessions
        .codec()
        .verify(TokenKind::Access, token)
        .map_err(|e| {
            debug!(error = %e, "access token rejected");
            AppError::Unauthorized("Invalid or expired token".into())
        })?;

    request.extensions_mut().insert(AuthenticatedUser(claims));

    Ok(next.run(request).await)
}

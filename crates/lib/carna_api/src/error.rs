//! Application error types.

use axum::{
    Json,
    extract::multipart::MultipartRejection,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use carna_core::auth::AuthError;
use carna_core::auth::store::StoreError;
use carna_core::catalog::CatalogError;
use thiserror::Error;
use tracing::error;

use crate::models::ErrorResponse;
use crate::services::uploads::UploadError;

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level errors with HTTP status mapping.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (error, message) = match &self {
            AppError::Validation(m) => ("validation_error", m.as_str()),
            AppError::NotFound(m) => ("not_found", m.as_str()),
            AppError::Unauthorized(m) => ("unauthorized", m.as_str()),
            AppError::Forbidden(m) => ("forbidden", m.as_str()),
            AppError::Conflict(m) => ("conflict", m.as_str()),
            AppError::Internal(detail) => {
                error!(error = %detail, "request failed");
                ("internal_error", "Internal server error")
            }
        };
        let body = Json(ErrorResponse {
            error: error.to_string(),
            message: message.to_string(),
        });
        (self.status(), body).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::Internal(e.to_string())
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::InvalidCredentials => {
                AppError::Unauthorized("Invalid username or password".into())
            }
            AuthError::AccountDisabled => AppError::Unauthorized("Account is disabled".into()),
            AuthError::MissingRefreshToken => {
                AppError::Unauthorized("Refresh token missing".into())
            }
            // Unknown subjects look the same as bad tokens to the caller.
            AuthError::InvalidRefreshToken(_) | AuthError::UnknownSubject => {
                AppError::Unauthorized("Invalid or expired refresh token".into())
            }
            AuthError::SessionRevoked => {
                AppError::Forbidden("Refresh token is no longer valid".into())
            }
            AuthError::Validation(msg) => AppError::Validation(msg),
            AuthError::Conflict(msg) => AppError::Conflict(msg),
            AuthError::Token(e) => AppError::Internal(format!("token: {e}")),
            AuthError::Store(e) => AppError::Internal(format!("store: {e}")),
            AuthError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        AppError::from(AuthError::from(e))
    }
}

impl From<CatalogError> for AppError {
    fn from(e: CatalogError) -> Self {
        match e {
            CatalogError::NotFound(msg) => AppError::NotFound(msg),
            CatalogError::Validation(msg) => AppError::Validation(msg),
            CatalogError::Db(e) => AppError::from(e),
        }
    }
}

impl From<UploadError> for AppError {
    fn from(e: UploadError) -> Self {
        match e {
            UploadError::NotAnImage(_) | UploadError::Multipart(_) | UploadError::MissingField(_) => {
                AppError::Validation(e.to_string())
            }
            UploadError::Io(e) => AppError::Internal(format!("upload: {e}")),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(e: JsonRejection) -> Self {
        AppError::Validation(e.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(e: PathRejection) -> Self {
        AppError::Validation(e.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(e: QueryRejection) -> Self {
        AppError::Validation(e.body_text())
    }
}

impl From<MultipartRejection> for AppError {
    fn from(e: MultipartRejection) -> Self {
        AppError::Validation(e.body_text())
    }
}

//! Favorite course handlers, always scoped to the caller.

use axum::Extension;
use axum::extract::State;
use carna_core::catalog::favorites;
use carna_core::models::catalog::Favorite;
use uuid::Uuid;

use crate::AppState;
use crate::error::AppResult;
use crate::extract::{Json, Path};
use crate::middleware::auth::AuthenticatedUser;
use crate::models::RemovedResponse;

/// `POST /api/courses/{courseId}/favorite`: idempotent.
pub async fn add_favorite_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(course_id): Path<Uuid>,
) -> AppResult<Json<Favorite>> {
    let favorite = favorites::add_favorite(&state.pool, user.user_id()?, course_id).await?;
    Ok(Json(favorite))
}

/// `DELETE /api/courses/{courseId}/favorite`
pub async fn remove_favorite_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(course_id): Path<Uuid>,
) -> AppResult<Json<RemovedResponse>> {
    favorites::remove_favorite(&state.pool, user.user_id()?, course_id).await?;
    Ok(Json(RemovedResponse { removed: true }))
}

/// `GET /api/courses/{courseId}/favorite`: whether the caller marked it.
pub async fn is_favorite_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(course_id): Path<Uuid>,
) -> AppResult<Json<bool>> {
    Ok(Json(
        favorites::is_favorite(&state.pool, user.user_id()?, course_id).await?,
    ))
}

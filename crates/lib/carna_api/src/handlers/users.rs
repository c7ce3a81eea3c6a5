//! User administration handlers.

use axum::Extension;
use axum::extract::State;
use axum::http::StatusCode;
use carna_core::auth::accounts;
use carna_core::auth::store::UserListQuery;
use carna_core::catalog::favorites;
use carna_core::listing::Page;
use carna_core::models::auth::{Role, User};
use carna_core::models::catalog::Course;
use uuid::Uuid;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::extract::{Json, Path, Query};
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{CreateUserRequest, UpdateUserRequest, UserListParams};

fn user_not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Could not find user with id {id}"))
}

/// `GET /api/users`: paged, filterable user list. Admin only.
pub async fn list_users_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Query(params): Query<UserListParams>,
) -> AppResult<Json<Page<User>>> {
    user.require_role(&[Role::Admin])?;
    let query = UserListQuery::try_from(params)?;
    Ok(Json(state.users.list(&query).await?))
}

/// `POST /api/users`: create an account. Admin only.
pub async fn create_user_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(body): Json<CreateUserRequest>,
) -> AppResult<(StatusCode, Json<User>)> {
    user.require_role(&[Role::Admin])?;
    let created = accounts::create_account(
        state.users.as_ref(),
        body.into(),
        state.config.auth.bcrypt_cost,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// `GET /api/users/{id}`: admin, or the user themself.
pub async fn get_user_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<User>> {
    user.require_admin_or_self(id)?;
    let record = state
        .users
        .find_by_id(id)
        .await?
        .ok_or_else(|| user_not_found(id))?;
    Ok(Json(record.user))
}

/// `PUT /api/users/{id}`: partial update. Non-admins may edit their own
/// profile but not their role or active flag.
pub async fn update_user_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateUserRequest>,
) -> AppResult<Json<User>> {
    user.require_admin_or_self(id)?;
    if user.role() != Role::Admin && body.changes_privileges() {
        return Err(AppError::Forbidden(
            "Only admins may change role or active status".into(),
        ));
    }
    let updated = accounts::update_account(
        state.users.as_ref(),
        id,
        body.into(),
        state.config.auth.bcrypt_cost,
    )
    .await?
    .ok_or_else(|| user_not_found(id))?;
    Ok(Json(updated))
}

/// `DELETE /api/users/{id}`: soft delete (deactivate). Admin only.
pub async fn delete_user_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    user.require_role(&[Role::Admin])?;
    accounts::deactivate_account(state.users.as_ref(), id)
        .await?
        .ok_or_else(|| user_not_found(id))?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/users/{id}/favorites`: the user's favorite courses.
pub async fn user_favorites_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Vec<Course>>> {
    user.require_admin_or_self(id)?;
    if state.users.find_by_id(id).await?.is_none() {
        return Err(user_not_found(id));
    }
    Ok(Json(favorites::list_favorites(&state.pool, id).await?))
}

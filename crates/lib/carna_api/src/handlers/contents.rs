//! Course content handlers. Create and update take `multipart/form-data`
//! with `name`, `description` and an optional `image` part.

use axum::Extension;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use carna_core::catalog::contents::{self, ContentChanges, DEFAULT_LATEST_LIMIT, NewContent};
use carna_core::catalog::{CatalogQuery, courses};
use carna_core::ids::new_id;
use carna_core::listing::Page;
use carna_core::models::auth::Role;
use carna_core::models::catalog::{Content, ContentWithCourse};
use uuid::Uuid;

use crate::AppState;
use crate::error::AppResult;
use crate::extract::{Json, Path, Query};
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{CatalogListParams, LatestParams};
use crate::services::uploads::read_content_form;

/// `GET /api/courses/{id}/contents`
pub async fn list_contents_handler(
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
    Query(params): Query<CatalogListParams>,
) -> AppResult<Json<Page<Content>>> {
    let query = CatalogQuery::try_from(params)?;
    courses::ensure_course(&state.pool, course_id).await?;
    Ok(Json(
        contents::list_contents(&state.pool, course_id, &query).await?,
    ))
}

/// `GET /api/courses/{id}/contents/{contentId}`
pub async fn get_content_handler(
    State(state): State<AppState>,
    Path((course_id, content_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<Content>> {
    Ok(Json(
        contents::get_content(&state.pool, course_id, content_id).await?,
    ))
}

/// `POST /api/courses/{id}/contents`: admin or editor.
pub async fn create_content_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(course_id): Path<Uuid>,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<(StatusCode, Json<Content>)> {
    user.require_role(&[Role::Admin, Role::Editor])?;
    let form = read_content_form(multipart?).await?;
    let name = form.require_name()?.to_string();
    let description = form.require_description()?.to_string();
    courses::ensure_course(&state.pool, course_id).await?;

    let id = new_id();
    let image = match &form.image {
        Some(upload) => Some(state.images.save(id, upload).await?),
        None => None,
    };
    let new = NewContent {
        id,
        name,
        description,
        image,
    };
    match contents::create_content(&state.pool, course_id, &new).await {
        Ok(content) => Ok((StatusCode::CREATED, Json(content))),
        Err(e) => {
            if let Some(url) = &new.image {
                state.images.remove_url(url).await;
            }
            Err(e.into())
        }
    }
}

/// `PUT /api/courses/{id}/contents/{contentId}`: admin or editor. A new
/// image replaces the old file once the record is updated.
pub async fn update_content_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path((course_id, content_id)): Path<(Uuid, Uuid)>,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<Json<Content>> {
    user.require_role(&[Role::Admin, Role::Editor])?;
    let form = read_content_form(multipart?).await?;
    let existing = contents::get_content(&state.pool, course_id, content_id).await?;

    let staged = match &form.image {
        Some(upload) => Some(state.images.stage(existing.id, upload).await?),
        None => None,
    };
    let changes = ContentChanges {
        name: form.name,
        description: form.description,
        image: staged.as_ref().map(|s| s.url().to_string()),
    };
    let updated = match contents::update_content(&state.pool, course_id, content_id, &changes).await {
        Ok(updated) => updated,
        Err(e) => {
            if let Some(staged) = staged {
                state.images.discard(staged).await;
            }
            return Err(e.into());
        }
    };
    if let Some(staged) = staged {
        state.images.commit(staged).await?;
    }
    Ok(Json(updated))
}

/// `DELETE /api/courses/{id}/contents/{contentId}`: admin only. Returns the
/// deleted id.
pub async fn delete_content_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path((course_id, content_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<Uuid>> {
    user.require_role(&[Role::Admin])?;
    let deleted = contents::delete_content(&state.pool, course_id, content_id).await?;
    if let Some(url) = &deleted.image {
        state.images.remove_url(url).await;
    }
    Ok(Json(deleted.id))
}

/// `GET /api/contents/latest?limit=5`: public dashboard feed.
pub async fn latest_contents_handler(
    State(state): State<AppState>,
    Query(params): Query<LatestParams>,
) -> AppResult<Json<Vec<ContentWithCourse>>> {
    let limit = params.limit.unwrap_or(DEFAULT_LATEST_LIMIT);
    Ok(Json(contents::latest_contents(&state.pool, limit).await?))
}

//! Course handlers.

use axum::Extension;
use axum::extract::State;
use axum::http::StatusCode;
use carna_core::catalog::courses::{self, CourseChanges};
use carna_core::catalog::{CatalogQuery, contents};
use carna_core::listing::Page;
use carna_core::models::auth::Role;
use carna_core::models::catalog::Course;
use uuid::Uuid;

use crate::AppState;
use crate::error::AppResult;
use crate::extract::{Json, Path, Query};
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{CatalogListParams, CourseRequest, UpdateCourseRequest};

/// `GET /api/courses`
pub async fn list_courses_handler(
    State(state): State<AppState>,
    Query(params): Query<CatalogListParams>,
) -> AppResult<Json<Page<Course>>> {
    let query = CatalogQuery::try_from(params)?;
    Ok(Json(courses::list_courses(&state.pool, &query).await?))
}

/// `POST /api/courses`: admin or editor.
pub async fn create_course_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(body): Json<CourseRequest>,
) -> AppResult<(StatusCode, Json<Course>)> {
    user.require_role(&[Role::Admin, Role::Editor])?;
    let course = courses::create_course(&state.pool, &body.name, &body.description).await?;
    Ok((StatusCode::CREATED, Json(course)))
}

/// `GET /api/courses/{id}`
pub async fn get_course_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Course>> {
    Ok(Json(courses::get_course(&state.pool, id).await?))
}

/// `PUT /api/courses/{id}`: admin or editor.
pub async fn update_course_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateCourseRequest>,
) -> AppResult<Json<Course>> {
    user.require_role(&[Role::Admin, Role::Editor])?;
    let changes = CourseChanges {
        name: body.name,
        description: body.description,
    };
    Ok(Json(courses::update_course(&state.pool, id, &changes).await?))
}

/// `DELETE /api/courses/{id}`: admin only. Returns the deleted id.
pub async fn delete_course_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Uuid>> {
    user.require_role(&[Role::Admin])?;
    let images = contents::course_images(&state.pool, id).await?;
    let deleted = courses::delete_course(&state.pool, id).await?;
    for url in images {
        state.images.remove_url(&url).await;
    }
    Ok(Json(deleted))
}

//! Request and response bodies.
//!
//! Domain types (`User`, `Course`, `Content`, `Page`) are serialized as is;
//! this module only holds the wire shapes that have no domain counterpart.

use carna_core::auth::accounts::{AccountUpdate, NewAccount};
use carna_core::auth::store::{UserListQuery, UserSort};
use carna_core::catalog::{CatalogQuery, CatalogSort};
use carna_core::listing::{Paging, SortOrder};
use carna_core::models::auth::{Role, User};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Error body: `{error, message}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Login/refresh success body. The refresh token travels in the cookie.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub password: String,
    pub role: Role,
}

impl From<CreateUserRequest> for NewAccount {
    fn from(r: CreateUserRequest) -> Self {
        NewAccount {
            first_name: r.first_name,
            last_name: r.last_name,
            username: r.username,
            password: r.password,
            role: r.role,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}

impl UpdateUserRequest {
    /// Whether the request touches fields only admins may change.
    pub fn changes_privileges(&self) -> bool {
        self.role.is_some() || self.is_active.is_some()
    }
}

impl From<UpdateUserRequest> for AccountUpdate {
    fn from(r: UpdateUserRequest) -> Self {
        AccountUpdate {
            first_name: r.first_name,
            last_name: r.last_name,
            username: r.username,
            password: r.password,
            role: r.role,
            is_active: r.is_active,
        }
    }
}

fn blank_as_none(raw: Option<String>) -> Option<String> {
    raw.filter(|v| !v.trim().is_empty())
}

fn paging(page: Option<i64>, limit: Option<i64>) -> Result<Paging, AppError> {
    Paging::new(page, limit).map_err(AppError::Validation)
}

/// `GET /api/users` query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserListParams {
    pub q: Option<String>,
    /// A role name, or `all` / empty for no filter.
    pub role: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub sort: Option<UserSort>,
    pub order: Option<SortOrder>,
}

impl TryFrom<UserListParams> for UserListQuery {
    type Error = AppError;

    fn try_from(p: UserListParams) -> Result<Self, Self::Error> {
        let role = match blank_as_none(p.role).as_deref() {
            None | Some("all") => None,
            Some(raw) => Some(raw.parse::<Role>().map_err(AppError::Validation)?),
        };
        Ok(UserListQuery {
            search: blank_as_none(p.q),
            role,
            paging: paging(p.page, p.limit)?,
            sort: p.sort.unwrap_or_default(),
            order: p.order.unwrap_or_default(),
        })
    }
}

/// Query string for course and content lists.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogListParams {
    pub name: Option<String>,
    pub description: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub sort: Option<CatalogSort>,
    pub order: Option<SortOrder>,
}

impl TryFrom<CatalogListParams> for CatalogQuery {
    type Error = AppError;

    fn try_from(p: CatalogListParams) -> Result<Self, Self::Error> {
        Ok(CatalogQuery {
            name: blank_as_none(p.name),
            description: blank_as_none(p.description),
            paging: paging(p.page, p.limit)?,
            sort: p.sort.unwrap_or_default(),
            order: p.order.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CourseRequest {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCourseRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LatestParams {
    pub limit: Option<i64>,
}

/// `DELETE /api/courses/{id}/favorite` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemovedResponse {
    pub removed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub db_connected: bool,
}

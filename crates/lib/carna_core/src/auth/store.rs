//! Credential store abstraction.
//!
//! The session manager only talks to users through this trait. Every
//! mutating method is a single-row atomic update; `swap_refresh_hash` is the
//! commit point of a refresh rotation.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use crate::listing::{Page, Paging, SortOrder};
use crate::models::auth::{NewUser, Role, User, UserChanges, UserRecord};

/// Store failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("{0}")]
    Conflict(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

/// Sortable user columns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UserSort {
    Username,
    FirstName,
    LastName,
    Role,
    IsActive,
    #[default]
    CreatedAt,
}

impl UserSort {
    pub fn column(&self) -> &'static str {
        match self {
            UserSort::Username => "username",
            UserSort::FirstName => "first_name",
            UserSort::LastName => "last_name",
            UserSort::Role => "role",
            UserSort::IsActive => "is_active",
            UserSort::CreatedAt => "created_at",
        }
    }
}

/// Filters for listing users.
#[derive(Debug, Clone, Default)]
pub struct UserListQuery {
    /// Matched against username, first and last name (case-insensitive).
    pub search: Option<String>,
    pub role: Option<Role>,
    pub paging: Paging,
    pub sort: UserSort,
    pub order: SortOrder,
}

/// Persistence of user records, including the refresh-token hash.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, StoreError>;

    /// Exact, case-sensitive username match.
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, StoreError>;

    /// Create a user. Fails with [`StoreError::Conflict`] on a taken username.
    async fn create(&self, user: NewUser) -> Result<User, StoreError>;

    /// Apply a partial update. Deactivating also clears the refresh hash.
    /// Returns `None` when the user does not exist.
    async fn update(&self, id: Uuid, changes: UserChanges) -> Result<Option<User>, StoreError>;

    async fn list(&self, query: &UserListQuery) -> Result<Page<User>, StoreError>;

    async fn count(&self) -> Result<i64, StoreError>;

    /// Unconditionally set or clear the refresh hash. Returns whether a row
    /// was touched.
    async fn set_refresh_hash(&self, id: Uuid, hash: Option<&str>) -> Result<bool, StoreError>;

    /// Replace the refresh hash only if it still equals `expected`.
    /// Returns whether the swap happened.
    async fn swap_refresh_hash(
        &self,
        id: Uuid,
        expected: &str,
        next: &str,
    ) -> Result<bool, StoreError>;
}

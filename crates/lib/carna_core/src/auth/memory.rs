//! In-process credential store.
//!
//! Used by tests and local tooling. Every method holds the map lock for its
//! whole body, so each call is atomic like a single-row SQL update.

use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::store::{CredentialStore, StoreError, UserListQuery, UserSort};
use crate::listing::{Page, SortOrder};
use crate::models::auth::{NewUser, User, UserChanges, UserRecord};

/// `CredentialStore` backed by a `HashMap`.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    users: Mutex<HashMap<Uuid, UserRecord>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn compare(a: &User, b: &User, sort: UserSort) -> Ordering {
    match sort {
        UserSort::Username => a.username.cmp(&b.username),
        UserSort::FirstName => a.first_name.cmp(&b.first_name),
        UserSort::LastName => a.last_name.cmp(&b.last_name),
        UserSort::Role => a.role.as_str().cmp(b.role.as_str()),
        UserSort::IsActive => a.is_active.cmp(&b.is_active),
        UserSort::CreatedAt => a.created_at.cmp(&b.created_at),
    }
}

fn matches_search(user: &User, term: &str) -> bool {
    let term = term.to_lowercase();
    [&user.username, &user.first_name, &user.last_name]
        .iter()
        .any(|field| field.to_lowercase().contains(&term))
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, StoreError> {
        Ok(self.users.lock().await.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, StoreError> {
        Ok(self
            .users
            .lock()
            .await
            .values()
            .find(|r| r.user.username == username)
            .cloned())
    }

    async fn create(&self, new: NewUser) -> Result<User, StoreError> {
        let mut users = self.users.lock().await;
        if users.values().any(|r| r.user.username == new.username) {
            return Err(StoreError::Conflict(
                "A user with this username already exists".into(),
            ));
        }
        let user = User {
            id: Uuid::new_v4(),
            first_name: new.first_name,
            last_name: new.last_name,
            username: new.username,
            role: new.role,
            is_active: new.is_active,
            created_at: Utc::now(),
        };
        users.insert(
            user.id,
            UserRecord {
                user: user.clone(),
                password_hash: new.password_hash,
                refresh_token_hash: None,
            },
        );
        Ok(user)
    }

    async fn update(&self, id: Uuid, changes: UserChanges) -> Result<Option<User>, StoreError> {
        let mut users = self.users.lock().await;
        if let Some(username) = &changes.username
            && users
                .values()
                .any(|r| r.user.id != id && &r.user.username == username)
        {
            return Err(StoreError::Conflict(
                "A user with this username already exists".into(),
            ));
        }
        let Some(record) = users.get_mut(&id) else {
            return Ok(None);
        };
        let deactivates = changes.deactivates();
        let UserChanges {
            first_name,
            last_name,
            username,
            password_hash,
            role,
            is_active,
        } = changes;
        if let Some(v) = first_name {
            record.user.first_name = v;
        }
        if let Some(v) = last_name {
            record.user.last_name = v;
        }
        if let Some(v) = username {
            record.user.username = v;
        }
        if let Some(v) = password_hash {
            record.password_hash = v;
        }
        if let Some(v) = role {
            record.user.role = v;
        }
        if let Some(v) = is_active {
            record.user.is_active = v;
        }
        if deactivates {
            record.refresh_token_hash = None;
        }
        Ok(Some(record.user.clone()))
    }

    async fn list(&self, query: &UserListQuery) -> Result<Page<User>, StoreError> {
        let users = self.users.lock().await;
        let mut matched: Vec<User> = users
            .values()
            .map(|r| r.user.clone())
            .filter(|u| query.role.is_none_or(|role| u.role == role))
            .filter(|u| {
                query
                    .search
                    .as_deref()
                    .is_none_or(|term| matches_search(u, term))
            })
            .collect();
        matched.sort_by(|a, b| {
            let ord = compare(a, b, query.sort);
            match query.order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            }
        });
        Ok(Page::from_sorted(matched, query.paging))
    }

    async fn count(&self) -> Result<i64, StoreError> {
        Ok(self.users.lock().await.len() as i64)
    }

    async fn set_refresh_hash(&self, id: Uuid, hash: Option<&str>) -> Result<bool, StoreError> {
        let mut users = self.users.lock().await;
        Ok(match users.get_mut(&id) {
            Some(record) => {
                record.refresh_token_hash = hash.map(str::to_string);
                true
            }
            None => false,
        })
    }

    async fn swap_refresh_hash(
        &self,
        id: Uuid,
        expected: &str,
        next: &str,
    ) -> Result<bool, StoreError> {
        let mut users = self.users.lock().await;
        Ok(match users.get_mut(&id) {
            Some(record) if record.refresh_token_hash.as_deref() == Some(expected) => {
                record.refresh_token_hash = Some(next.to_string());
                true
            }
            _ => false,
        })
    }
}

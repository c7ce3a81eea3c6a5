//! PostgreSQL credential store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::store::{CredentialStore, StoreError, UserListQuery};
use crate::listing::{Page, contains_pattern, search_term};
use crate::models::auth::{NewUser, Role, User, UserChanges, UserRecord};

const USER_COLUMNS: &str = "id, first_name, last_name, username, password_hash, role, \
                            is_active, refresh_token_hash, created_at";

/// Row as stored in the `users` table.
#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    first_name: String,
    last_name: String,
    username: String,
    password_hash: String,
    role: String,
    is_active: bool,
    refresh_token_hash: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for UserRecord {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role: Role = row
            .role
            .parse()
            .map_err(|e| StoreError::Corrupt(format!("user {}: {e}", row.id)))?;
        Ok(UserRecord {
            user: User {
                id: row.id,
                first_name: row.first_name,
                last_name: row.last_name,
                username: row.username,
                role,
                is_active: row.is_active,
                created_at: row.created_at,
            },
            password_hash: row.password_hash,
            refresh_token_hash: row.refresh_token_hash,
        })
    }
}

/// Map a unique-constraint violation on `username` to a conflict.
fn map_unique(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e
        && db.is_unique_violation()
    {
        return StoreError::Conflict("A user with this username already exists".into());
    }
    StoreError::Db(e)
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, query: &UserListQuery) {
    if let Some(term) = search_term(query.search.as_deref()) {
        let pattern = contains_pattern(term);
        qb.push(" AND (username ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR first_name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR last_name ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(role) = query.role {
        qb.push(" AND role = ").push_bind(role.as_str());
    }
}

/// `CredentialStore` over the `users` table.
#[derive(Debug, Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(UserRecord::try_from).transpose()
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        row.map(UserRecord::try_from).transpose()
    }

    async fn create(&self, new: NewUser) -> Result<User, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "INSERT INTO users (first_name, last_name, username, password_hash, role, is_active) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(&new.first_name)
        .bind(&new.last_name)
        .bind(&new.username)
        .bind(&new.password_hash)
        .bind(new.role.as_str())
        .bind(new.is_active)
        .fetch_one(&self.pool)
        .await
        .map_err(map_unique)?;
        Ok(UserRecord::try_from(row)?.user)
    }

    async fn update(&self, id: Uuid, changes: UserChanges) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "UPDATE users SET \
                 first_name = COALESCE($2, first_name), \
                 last_name = COALESCE($3, last_name), \
                 username = COALESCE($4, username), \
                 password_hash = COALESCE($5, password_hash), \
                 role = COALESCE($6, role), \
                 is_active = COALESCE($7, is_active), \
                 refresh_token_hash = CASE WHEN $7 = FALSE THEN NULL ELSE refresh_token_hash END \
             WHERE id = $1 \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(changes.first_name)
        .bind(changes.last_name)
        .bind(changes.username)
        .bind(changes.password_hash)
        .bind(changes.role.map(|r| r.as_str()))
        .bind(changes.is_active)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_unique)?;
        row.map(|r| UserRecord::try_from(r).map(|rec| rec.user))
            .transpose()
    }

    async fn list(&self, query: &UserListQuery) -> Result<Page<User>, StoreError> {
        let mut count_qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM users WHERE TRUE");
        push_filters(&mut count_qb, query);
        let total = count_qb
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {USER_COLUMNS} FROM users WHERE TRUE"
        ));
        push_filters(&mut qb, query);
        qb.push(format!(
            " ORDER BY {} {}, id",
            query.sort.column(),
            query.order.as_sql()
        ));
        qb.push(" LIMIT ")
            .push_bind(query.paging.limit)
            .push(" OFFSET ")
            .push_bind(query.paging.offset());
        let rows = qb
            .build_query_as::<UserRow>()
            .fetch_all(&self.pool)
            .await?;

        let users = rows
            .into_iter()
            .map(|r| UserRecord::try_from(r).map(|rec| rec.user))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(users, query.paging, total))
    }

    async fn count(&self) -> Result<i64, StoreError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn set_refresh_hash(&self, id: Uuid, hash: Option<&str>) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE users SET refresh_token_hash = $2 WHERE id = $1")
            .bind(id)
            .bind(hash)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn swap_refresh_hash(
        &self,
        id: Uuid,
        expected: &str,
        next: &str,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE users SET refresh_token_hash = $3 \
             WHERE id = $1 AND refresh_token_hash = $2",
        )
        .bind(id)
        .bind(expected)
        .bind(next)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

//! Course content persistence.
//!
//! Content ids are allocated by the caller (see [`crate::ids::new_id`]) so
//! an uploaded image can be named after the row before it is inserted.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::debug;
use uuid::Uuid;

use super::{CatalogError, CatalogQuery, optional_text, push_filters, require_text};
use crate::listing::{MAX_LIMIT, Page};
use crate::models::catalog::{Content, ContentWithCourse, Course};

/// Number of items the dashboard feed returns by default.
pub const DEFAULT_LATEST_LIMIT: i64 = 5;

const CONTENT_COLUMNS: &str = "id, course_id, name, description, image, date_created";

/// Fields for a new content item.
#[derive(Debug, Clone)]
pub struct NewContent {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    /// Public image URL, already stored.
    pub image: Option<String>,
}

/// Partial content update. `image: Some(..)` replaces the URL.
#[derive(Debug, Clone, Default)]
pub struct ContentChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
}

fn not_found(id: Uuid) -> CatalogError {
    CatalogError::NotFound(format!("Could not find content with id {id}"))
}

/// List a course's contents, one page at a time.
pub async fn list_contents(
    pool: &PgPool,
    course_id: Uuid,
    query: &CatalogQuery,
) -> Result<Page<Content>, CatalogError> {
    let mut count_qb =
        QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM contents WHERE course_id = ");
    count_qb.push_bind(course_id);
    push_filters(&mut count_qb, query);
    let total = count_qb
        .build_query_scalar::<i64>()
        .fetch_one(pool)
        .await?;

    let mut qb = QueryBuilder::<Postgres>::new(format!(
        "SELECT {CONTENT_COLUMNS} FROM contents WHERE course_id = "
    ));
    qb.push_bind(course_id);
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
    let rows = qb.build_query_as::<Content>().fetch_all(pool).await?;

    Ok(Page::new(rows, query.paging, total))
}

/// Get one content item, scoped to its course.
pub async fn get_content(pool: &PgPool, course_id: Uuid, id: Uuid) -> Result<Content, CatalogError> {
    sqlx::query_as::<_, Content>(&format!(
        "SELECT {CONTENT_COLUMNS} FROM contents WHERE course_id = $1 AND id = $2"
    ))
    .bind(course_id)
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| not_found(id))
}

/// Insert a content item under an existing course.
pub async fn create_content(
    pool: &PgPool,
    course_id: Uuid,
    new: &NewContent,
) -> Result<Content, CatalogError> {
    let name = require_text("name", &new.name)?;
    let description = require_text("description", &new.description)?;
    super::courses::ensure_course(pool, course_id).await?;

    let content = sqlx::query_as::<_, Content>(&format!(
        "INSERT INTO contents (id, course_id, name, description, image) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING {CONTENT_COLUMNS}"
    ))
    .bind(new.id)
    .bind(course_id)
    .bind(name)
    .bind(description)
    .bind(new.image.as_deref())
    .fetch_one(pool)
    .await?;
    debug!(content_id = %content.id, course_id = %course_id, "content created");
    Ok(content)
}

/// Apply a partial update to a content item.
pub async fn update_content(
    pool: &PgPool,
    course_id: Uuid,
    id: Uuid,
    changes: &ContentChanges,
) -> Result<Content, CatalogError> {
    let name = optional_text("name", changes.name.as_deref())?;
    let description = optional_text("description", changes.description.as_deref())?;
    sqlx::query_as::<_, Content>(&format!(
        "UPDATE contents SET \
             name = COALESCE($3, name), \
             description = COALESCE($4, description), \
             image = COALESCE($5, image) \
         WHERE course_id = $1 AND id = $2 \
         RETURNING {CONTENT_COLUMNS}"
    ))
    .bind(course_id)
    .bind(id)
    .bind(name)
    .bind(description)
    .bind(changes.image.as_deref())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| not_found(id))
}

/// Delete a content item, returning the removed row.
pub async fn delete_content(pool: &PgPool, course_id: Uuid, id: Uuid) -> Result<Content, CatalogError> {
    let content = sqlx::query_as::<_, Content>(&format!(
        "DELETE FROM contents WHERE course_id = $1 AND id = $2 RETURNING {CONTENT_COLUMNS}"
    ))
    .bind(course_id)
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| not_found(id))?;
    debug!(content_id = %id, "content deleted");
    Ok(content)
}

/// Image URLs attached to a course's contents.
pub async fn course_images(pool: &PgPool, course_id: Uuid) -> Result<Vec<String>, CatalogError> {
    let images = sqlx::query_scalar::<_, String>(
        "SELECT image FROM contents WHERE course_id = $1 AND image IS NOT NULL",
    )
    .bind(course_id)
    .fetch_all(pool)
    .await?;
    Ok(images)
}

#[derive(sqlx::FromRow)]
struct LatestRow {
    id: Uuid,
    course_id: Uuid,
    name: String,
    description: String,
    image: Option<String>,
    date_created: DateTime<Utc>,
    course_name: String,
    course_description: String,
    course_date_created: DateTime<Utc>,
}

impl From<LatestRow> for ContentWithCourse {
    fn from(row: LatestRow) -> Self {
        ContentWithCourse {
            course: Course {
                id: row.course_id,
                name: row.course_name,
                description: row.course_description,
                date_created: row.course_date_created,
            },
            content: Content {
                id: row.id,
                course_id: row.course_id,
                name: row.name,
                description: row.description,
                image: row.image,
                date_created: row.date_created,
            },
        }
    }
}

/// Newest contents across all courses, each with its course.
pub async fn latest_contents(pool: &PgPool, limit: i64) -> Result<Vec<ContentWithCourse>, CatalogError> {
    if !(1..=MAX_LIMIT).contains(&limit) {
        return Err(CatalogError::Validation(format!(
            "limit must be between 1 and {MAX_LIMIT}"
        )));
    }
    let rows = sqlx::query_as::<_, LatestRow>(
        r#"
        SELECT c.id, c.course_id, c.name, c.description, c.image, c.date_created,
               co.name AS course_name,
               co.description AS course_description,
               co.date_created AS course_date_created
        FROM contents c
        JOIN courses co ON co.id = c.course_id
        ORDER BY c.date_created DESC, c.id DESC
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(ContentWithCourse::from).collect())
}

//! Course persistence.

use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::debug;
use uuid::Uuid;

use super::{CatalogError, CatalogQuery, optional_text, push_filters, require_text};
use crate::ids::new_id;
use crate::listing::Page;
use crate::models::catalog::Course;

/// Partial course update.
#[derive(Debug, Clone, Default)]
pub struct CourseChanges {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// List courses matching the filters, one page at a time.
pub async fn list_courses(pool: &PgPool, query: &CatalogQuery) -> Result<Page<Course>, CatalogError> {
    let mut count_qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM courses WHERE TRUE");
    push_filters(&mut count_qb, query);
    let total = count_qb
        .build_query_scalar::<i64>()
        .fetch_one(pool)
        .await?;

    let mut qb = QueryBuilder::<Postgres>::new(
        "SELECT id, name, description, date_created FROM courses WHERE TRUE",
    );
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
    let rows = qb.build_query_as::<Course>().fetch_all(pool).await?;

    Ok(Page::new(rows, query.paging, total))
}

/// Get a course by ID.
pub async fn get_course(pool: &PgPool, id: Uuid) -> Result<Course, CatalogError> {
    sqlx::query_as::<_, Course>(
        "SELECT id, name, description, date_created FROM courses WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| CatalogError::NotFound(format!("Could not find course with id {id}")))
}

/// Create a course.
pub async fn create_course(
    pool: &PgPool,
    name: &str,
    description: &str,
) -> Result<Course, CatalogError> {
    let name = require_text("name", name)?;
    let description = require_text("description", description)?;
    let course = sqlx::query_as::<_, Course>(
        r#"
        INSERT INTO courses (id, name, description)
        VALUES ($1, $2, $3)
        RETURNING id, name, description, date_created
        "#,
    )
    .bind(new_id())
    .bind(name)
    .bind(description)
    .fetch_one(pool)
    .await?;
    debug!(course_id = %course.id, "course created");
    Ok(course)
}

/// Apply a partial update to a course.
pub async fn update_course(
    pool: &PgPool,
    id: Uuid,
    changes: &CourseChanges,
) -> Result<Course, CatalogError> {
    let name = optional_text("name", changes.name.as_deref())?;
    let description = optional_text("description", changes.description.as_deref())?;
    sqlx::query_as::<_, Course>(
        r#"
        UPDATE courses
        SET name = COALESCE($2, name),
            description = COALESCE($3, description)
        WHERE id = $1
        RETURNING id, name, description, date_created
        "#,
    )
    .bind(id)
    .bind(name)
    .bind(description)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| CatalogError::NotFound(format!("Could not find course with id {id}")))
}

/// Delete a course; its contents and favorites go with it.
pub async fn delete_course(pool: &PgPool, id: Uuid) -> Result<Uuid, CatalogError> {
    let result = sqlx::query("DELETE FROM courses WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(CatalogError::NotFound(format!(
            "Could not find course with id {id}"
        )));
    }
    debug!(course_id = %id, "course deleted");
    Ok(id)
}

/// Fail with `NotFound` unless the course exists.
pub async fn ensure_course(pool: &PgPool, id: Uuid) -> Result<(), CatalogError> {
    let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM courses WHERE id = $1)")
        .bind(id)
        .fetch_one(pool)
        .await?;
    if !exists {
        return Err(CatalogError::NotFound(format!(
            "Could not find course with id {id}"
        )));
    }
    Ok(())
}

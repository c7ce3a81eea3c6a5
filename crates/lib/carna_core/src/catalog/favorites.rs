//! Favorite courses per user.

use sqlx::PgPool;
use uuid::Uuid;

use super::CatalogError;
use super::courses::ensure_course;
use crate::ids::new_id;
use crate::models::catalog::{Course, Favorite};

/// Mark a course as a favorite. Idempotent: an existing favorite is returned.
pub async fn add_favorite(
    pool: &PgPool,
    user_id: Uuid,
    course_id: Uuid,
) -> Result<Favorite, CatalogError> {
    ensure_course(pool, course_id).await?;
    sqlx::query(
        r#"
        INSERT INTO favorites (id, user_id, course_id)
        VALUES ($1, $2, $3)
        ON CONFLICT (user_id, course_id) DO NOTHING
        "#,
    )
    .bind(new_id())
    .bind(user_id)
    .bind(course_id)
    .execute(pool)
    .await?;
    let favorite = sqlx::query_as::<_, Favorite>(
        "SELECT id, user_id, course_id FROM favorites WHERE user_id = $1 AND course_id = $2",
    )
    .bind(user_id)
    .bind(course_id)
    .fetch_one(pool)
    .await?;
    Ok(favorite)
}

/// Remove a favorite. Fails with `NotFound` if the course was not a favorite.
pub async fn remove_favorite(
    pool: &PgPool,
    user_id: Uuid,
    course_id: Uuid,
) -> Result<(), CatalogError> {
    ensure_course(pool, course_id).await?;
    let result = sqlx::query("DELETE FROM favorites WHERE user_id = $1 AND course_id = $2")
        .bind(user_id)
        .bind(course_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(CatalogError::NotFound("Favorite not found".into()));
    }
    Ok(())
}

/// Whether the user has marked the course. Unknown courses are `false`.
pub async fn is_favorite(pool: &PgPool, user_id: Uuid, course_id: Uuid) -> Result<bool, CatalogError> {
    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM favorites WHERE user_id = $1 AND course_id = $2)",
    )
    .bind(user_id)
    .bind(course_id)
    .fetch_one(pool)
    .await?;
    Ok(exists)
}

/// A user's favorite courses, newest course first.
pub async fn list_favorites(pool: &PgPool, user_id: Uuid) -> Result<Vec<Course>, CatalogError> {
    let courses = sqlx::query_as::<_, Course>(
        r#"
        SELECT co.id, co.name, co.description, co.date_created
        FROM favorites f
        JOIN courses co ON co.id = f.course_id
        WHERE f.user_id = $1
        ORDER BY co.date_created DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(courses)
}

//! Dashboard counts.

use sqlx::PgPool;

use super::CatalogError;
use crate::models::catalog::Stats;

#[derive(sqlx::FromRow)]
struct CatalogCounts {
    courses: i64,
    contents: i64,
}

/// Count courses and contents in one round trip.
///
/// Users live behind the credential store, so their count is passed in.
pub async fn stats(pool: &PgPool, number_of_users: i64) -> Result<Stats, CatalogError> {
    let counts = sqlx::query_as::<_, CatalogCounts>(
        r#"
        SELECT (SELECT COUNT(*) FROM courses)  AS courses,
               (SELECT COUNT(*) FROM contents) AS contents
        "#,
    )
    .fetch_one(pool)
    .await?;
    Ok(Stats {
        number_of_users,
        number_of_courses: counts.courses,
        number_of_contents: counts.contents,
    })
}

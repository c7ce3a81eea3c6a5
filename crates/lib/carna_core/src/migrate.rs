//! Embedded schema migrations from `carna_core/migrations/`.

use sqlx::PgPool;
use tracing::info;

/// Run all pending migrations against the given pool.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("database migrations applied");
    Ok(())
}

//! Liveness endpoint.

use axum::Json;
use axum::extract::State;
use tracing::warn;

use crate::AppState;
use crate::models::HealthResponse;

/// `GET /api/health`: reports the version and whether PostgreSQL answers.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_connected = match sqlx::query("SELECT 1").execute(&state.pool).await {
        Ok(_) => true,
        Err(e) => {
            warn!("Database health check failed: {e}");
            false
        }
    };

    Json(HealthResponse {
        status: "ok".into(),
        version: carna_core::version().into(),
        db_connected,
    })
}

//! Dashboard stats handler.

use axum::Json;
use axum::extract::State;
use carna_core::catalog::stats;
use carna_core::models::catalog::Stats;

use crate::AppState;
use crate::error::AppResult;

/// `GET /api/stats`: number of users, courses and contents.
pub async fn stats_handler(State(state): State<AppState>) -> AppResult<Json<Stats>> {
    let users = state.users.count().await?;
    Ok(Json(stats::stats(&state.pool, users).await?))
}

//! # carna_api
//!
//! HTTP API library for Carna: the auth/session endpoints plus users,
//! courses, contents, favorites and dashboard stats.

pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method};
use axum::routing::{get, post};
use carna_core::auth::queries::PgCredentialStore;
use carna_core::auth::session::SessionManager;
use carna_core::auth::store::CredentialStore;
use sqlx::PgPool;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::config::ApiConfig;
use crate::handlers::{auth, contents, courses, favorites, health, stats, users};
use crate::services::cookies::CookiePolicy;
use crate::services::uploads::{ImageStore, UPLOAD_URL_PREFIX};

/// Largest accepted request body (content forms carry images).
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// PostgreSQL connection pool.
    pub pool: PgPool,
    /// API configuration.
    pub config: ApiConfig,
    /// Login, refresh and logout.
    pub sessions: Arc<SessionManager>,
    /// User records; the same store the session manager uses.
    pub users: Arc<dyn CredentialStore>,
    /// Refresh cookie attributes.
    pub cookies: CookiePolicy,
    /// Content image files.
    pub images: ImageStore,
}

impl AppState {
    /// State backed by PostgreSQL for users as well as the catalog.
    pub fn new(pool: PgPool, config: ApiConfig) -> Self {
        let users: Arc<dyn CredentialStore> = Arc::new(PgCredentialStore::new(pool.clone()));
        Self::with_store(pool, config, users)
    }

    /// State with an explicit credential store.
    pub fn with_store(pool: PgPool, config: ApiConfig, users: Arc<dyn CredentialStore>) -> Self {
        let sessions = Arc::new(SessionManager::new(users.clone(), &config.auth));
        Self {
            cookies: CookiePolicy::from_config(&config),
            images: ImageStore::new(config.upload_dir.clone()),
            pool,
            config,
            sessions,
            users,
        }
    }
}

/// Run embedded database migrations.
///
/// Delegates to `carna_core::migrate::migrate()` which owns the migration files.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    carna_core::migrate::migrate(pool).await
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .allow_credentials(true)
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    // Public routes (no auth required)
    let public = Router::new()
        .route("/api/health", get(health::health_handler))
        .route("/api/auth/login", post(auth::login_handler))
        .route("/api/auth/refresh", post(auth::refresh_handler))
        .route(
            "/api/contents/latest",
            get(contents::latest_contents_handler),
        );

    // Protected routes (require auth)
    let protected = Router::new()
        .route("/api/auth/logout", post(auth::logout_handler))
        .route(
            "/api/users",
            get(users::list_users_handler).post(users::create_user_handler),
        )
        .route(
            "/api/users/{id}",
            get(users::get_user_handler)
                .put(users::update_user_handler)
                .delete(users::delete_user_handler),
        )
        .route(
            "/api/users/{id}/favorites",
            get(users::user_favorites_handler),
        )
        .route(
            "/api/courses",
            get(courses::list_courses_handler).post(courses::create_course_handler),
        )
        .route(
            "/api/courses/{id}",
            get(courses::get_course_handler)
                .put(courses::update_course_handler)
                .delete(courses::delete_course_handler),
        )
        .route(
            "/api/courses/{id}/contents",
            get(contents::list_contents_handler).post(contents::create_content_handler),
        )
        .route(
            "/api/courses/{id}/contents/{content_id}",
            get(contents::get_content_handler)
                .put(contents::update_content_handler)
                .delete(contents::delete_content_handler),
        )
        .route(
            "/api/courses/{id}/favorite",
            get(favorites::is_favorite_handler)
                .post(favorites::add_favorite_handler)
                .delete(favorites::remove_favorite_handler),
        )
        .route("/api/stats", get(stats::stats_handler))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth,
        ));

    Router::new()
        .merge(public)
        .merge(protected)
        .nest_service(UPLOAD_URL_PREFIX, ServeDir::new(&state.config.upload_dir))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}

//! Router tests for the session endpoints and user administration.
//!
//! Users live in a `MemoryCredentialStore`; the PostgreSQL pool is lazy and
//! never reached by these routes.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode, header};
use axum_extra::extract::cookie::{Cookie, SameSite};
use carna_api::config::ApiConfig;
use carna_api::services::cookies::REFRESH_COOKIE;
use carna_api::{AppState, router};
use carna_core::auth::accounts::{NewAccount, create_account};
use carna_core::auth::config::AuthConfig;
use carna_core::auth::memory::MemoryCredentialStore;
use carna_core::auth::password::hash_refresh_token;
use carna_core::auth::store::{CredentialStore, StoreError, UserListQuery};
use carna_core::listing::Page;
use carna_core::models::auth::{NewUser, Role, User, UserChanges, UserRecord};
use serde_json::{Value, json};
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt;
use uuid::Uuid;

const ADMIN_PASSWORD: &str = "admin123";
const BOB_PASSWORD: &str = "bobpass1";

struct TestApp {
    app: Router,
    store: Arc<MemoryCredentialStore>,
    bob: User,
}

fn test_config() -> ApiConfig {
    ApiConfig {
        bind_addr: "127.0.0.1:0".into(),
        pg_connection_url: "postgres://127.0.0.1:1/unused".into(),
        auth: AuthConfig::new("test-access-secret", "test-refresh-secret")
            .unwrap()
            .with_bcrypt_cost(4),
        cookie_secure: false,
        upload_dir: std::env::temp_dir().join("carna-api-tests"),
        cors_origins: vec!["http://localhost:3000".into()],
        app_env: "test".into(),
    }
}

fn lazy_pool(config: &ApiConfig) -> sqlx::PgPool {
    PgPoolOptions::new()
        .acquire_timeout(Duration::from_millis(200))
        .connect_lazy(&config.pg_connection_url)
        .expect("lazy pool")
}

/// Memory store seeded with `admin` and `bob`; returns bob.
async fn seeded_store() -> (Arc<MemoryCredentialStore>, User) {
    let store = Arc::new(MemoryCredentialStore::new());
    let account = |username: &str, password: &str, role| NewAccount {
        first_name: "Test".into(),
        last_name: username.into(),
        username: username.into(),
        password: password.into(),
        role,
    };
    create_account(store.as_ref(), account("admin", ADMIN_PASSWORD, Role::Admin), 4)
        .await
        .unwrap();
    let bob = create_account(store.as_ref(), account("bob", BOB_PASSWORD, Role::User), 4)
        .await
        .unwrap();
    (store, bob)
}

async fn test_app() -> TestApp {
    let config = test_config();
    let pool = lazy_pool(&config);
    let (store, bob) = seeded_store().await;
    let state = AppState::with_store(pool, config, store.clone());
    TestApp {
        app: router(state),
        store,
        bob,
    }
}

/// Delegates to a memory store; id lookups fail once `broken` is set.
struct BrokenLookups {
    inner: Arc<MemoryCredentialStore>,
    broken: AtomicBool,
}

#[async_trait]
impl CredentialStore for BrokenLookups {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, StoreError> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(StoreError::Db(sqlx::Error::PoolTimedOut));
        }
        self.inner.find_by_id(id).await
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, StoreError> {
        self.inner.find_by_username(username).await
    }

    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        self.inner.create(user).await
    }

    async fn update(&self, id: Uuid, changes: UserChanges) -> Result<Option<User>, StoreError> {
        self.inner.update(id, changes).await
    }

    async fn list(&self, query: &UserListQuery) -> Result<Page<User>, StoreError> {
        self.inner.list(query).await
    }

    async fn count(&self) -> Result<i64, StoreError> {
        self.inner.count().await
    }

    async fn set_refresh_hash(&self, id: Uuid, hash: Option<&str>) -> Result<bool, StoreError> {
        self.inner.set_refresh_hash(id, hash).await
    }

    async fn swap_refresh_hash(
        &self,
        id: Uuid,
        expected: &str,
        next: &str,
    ) -> Result<bool, StoreError> {
        self.inner.swap_refresh_hash(id, expected, next).await
    }
}

async fn send(app: &Router, req: Request<Body>) -> Response<Body> {
    app.clone().oneshot(req).await.expect("request")
}

async fn json_body(resp: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("parse JSON")
}

fn refresh_cookie(resp: &Response<Body>) -> Cookie<'static> {
    let raw = resp
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with(REFRESH_COOKIE))
        .expect("refresh cookie set");
    Cookie::parse(raw.to_string()).expect("parse cookie")
}

fn login_request(username: &str, password: &str) -> Request<Body> {
    Request::post("/api/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({"username": username, "password": password}).to_string(),
        ))
        .unwrap()
}

fn refresh_request(cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::post("/api/auth/refresh");
    if let Some(value) = cookie {
        builder = builder.header(header::COOKIE, format!("{REFRESH_COOKIE}={value}"));
    }
    builder.body(Body::empty()).unwrap()
}

fn authed(method: &str, uri: &str, token: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"));
    match body {
        Some(b) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Log in and return `(access token, refresh cookie value)`.
async fn login(app: &Router, username: &str, password: &str) -> (String, String) {
    let resp = send(app, login_request(username, password)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let cookie = refresh_cookie(&resp).value().to_string();
    let body = json_body(resp).await;
    (body["token"].as_str().unwrap().to_string(), cookie)
}

fn assert_cleared(cookie: &Cookie<'_>) {
    assert_eq!(cookie.value(), "");
    assert_eq!(cookie.max_age(), Some(time::Duration::ZERO));
    assert_eq!(cookie.http_only(), Some(true));
    assert_eq!(cookie.same_site(), Some(SameSite::Lax));
    assert_eq!(cookie.path(), Some("/api"));
}

#[tokio::test]
async fn login_returns_token_and_sets_refresh_cookie() {
    let t = test_app().await;
    let resp = send(&t.app, login_request("bob", BOB_PASSWORD)).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let cookie = refresh_cookie(&resp);
    assert!(!cookie.value().is_empty());
    assert_eq!(cookie.http_only(), Some(true));
    assert_eq!(cookie.same_site(), Some(SameSite::Lax));
    assert_eq!(cookie.path(), Some("/api"));
    assert_eq!(cookie.max_age(), Some(time::Duration::days(30)));

    let body = json_body(resp).await;
    assert!(body["token"].is_string());
    assert_eq!(body["user"]["username"], "bob");
    assert_eq!(body["user"]["role"], "user");
    assert!(body["user"].get("passwordHash").is_none());
    assert!(body.get("refreshToken").is_none());
}

#[tokio::test]
async fn wrong_password_is_unauthorized_and_keeps_session() {
    let t = test_app().await;
    let (_, cookie) = login(&t.app, "bob", BOB_PASSWORD).await;

    let resp = send(&t.app, login_request("bob", "nope123")).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(resp).await;
    assert_eq!(body["error"], "unauthorized");
    assert_eq!(body["message"], "Invalid username or password");

    let resp = send(&t.app, refresh_request(Some(&cookie))).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn refresh_rotates_and_old_cookie_revokes_session() {
    let t = test_app().await;
    let (_, r0) = login(&t.app, "bob", BOB_PASSWORD).await;

    let resp = send(&t.app, refresh_request(Some(&r0))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let r1 = refresh_cookie(&resp).value().to_string();
    assert_ne!(r0, r1);
    let body = json_body(resp).await;
    assert_eq!(body["user"]["id"], t.bob.id.to_string());

    let resp = send(&t.app, refresh_request(Some(&r0))).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_cleared(&refresh_cookie(&resp));

    let resp = send(&t.app, refresh_request(Some(&r1))).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_cleared(&refresh_cookie(&resp));
}

#[tokio::test]
async fn refresh_failures_always_clear_cookie() {
    let t = test_app().await;

    let resp = send(&t.app, refresh_request(None)).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_cleared(&refresh_cookie(&resp));

    let resp = send(&t.app, refresh_request(Some("garbage"))).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_cleared(&refresh_cookie(&resp));

    // An access token presented as the refresh cookie.
    let (access, _) = login(&t.app, "bob", BOB_PASSWORD).await;
    let resp = send(&t.app, refresh_request(Some(&access))).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_cleared(&refresh_cookie(&resp));
}

#[tokio::test]
async fn logout_is_idempotent_and_ends_refresh() {
    let t = test_app().await;
    let (access, cookie) = login(&t.app, "bob", BOB_PASSWORD).await;

    let resp = send(&t.app, Request::post("/api/auth/logout").body(Body::empty()).unwrap()).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    for _ in 0..2 {
        let resp = send(&t.app, authed("POST", "/api/auth/logout", &access, None)).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_cleared(&refresh_cookie(&resp));
        assert_eq!(json_body(resp).await, json!(true));
    }

    let record = t.store.find_by_id(t.bob.id).await.unwrap().unwrap();
    assert_eq!(record.refresh_token_hash, None);

    let resp = send(&t.app, refresh_request(Some(&cookie))).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn deactivated_account_cannot_login_or_refresh() {
    let t = test_app().await;
    let (admin, _) = login(&t.app, "admin", ADMIN_PASSWORD).await;
    let (_, bob_cookie) = login(&t.app, "bob", BOB_PASSWORD).await;

    let uri = format!("/api/users/{}", t.bob.id);
    let resp = send(&t.app, authed("DELETE", &uri, &admin, None)).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = send(&t.app, login_request("bob", BOB_PASSWORD)).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(resp).await["message"], "Account is disabled");

    let resp = send(&t.app, refresh_request(Some(&bob_cookie))).await;
    assert!(resp.status() == StatusCode::FORBIDDEN || resp.status() == StatusCode::UNAUTHORIZED);
    assert_cleared(&refresh_cookie(&resp));
}

#[tokio::test]
async fn disabled_account_with_live_hash_refresh_is_unauthorized() {
    let t = test_app().await;
    let (_, cookie) = login(&t.app, "bob", BOB_PASSWORD).await;

    let deactivate = UserChanges {
        is_active: Some(false),
        ..Default::default()
    };
    t.store.update(t.bob.id, deactivate).await.unwrap();
    // Put the hash back so refresh gets past the session check.
    t.store
        .set_refresh_hash(t.bob.id, Some(&hash_refresh_token(&cookie)))
        .await
        .unwrap();

    let resp = send(&t.app, refresh_request(Some(&cookie))).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_cleared(&refresh_cookie(&resp));
    assert_eq!(json_body(resp).await["message"], "Account is disabled");

    let record = t.store.find_by_id(t.bob.id).await.unwrap().unwrap();
    assert_eq!(record.refresh_token_hash, None);
}

#[tokio::test]
async fn store_failure_during_refresh_is_500_and_clears_cookie() {
    let config = test_config();
    let pool = lazy_pool(&config);
    let (inner, _) = seeded_store().await;
    let store = Arc::new(BrokenLookups {
        inner,
        broken: AtomicBool::new(false),
    });
    let app = router(AppState::with_store(pool, config, store.clone()));

    let (_, cookie) = login(&app, "bob", BOB_PASSWORD).await;
    store.broken.store(true, Ordering::SeqCst);

    let resp = send(&app, refresh_request(Some(&cookie))).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_cleared(&refresh_cookie(&resp));
    let body = json_body(resp).await;
    assert_eq!(body["error"], "internal_error");
    assert_eq!(body["message"], "Internal server error");
}

#[tokio::test]
async fn extractor_rejections_are_json_errors() {
    let t = test_app().await;

    let resp = send(
        &t.app,
        Request::post("/api/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{}"))
            .unwrap(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(
        resp.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("application/json")
    );
    let body = json_body(resp).await;
    assert_eq!(body["error"], "validation_error");
    assert!(body["message"].as_str().unwrap().contains("username"));

    let (admin, _) = login(&t.app, "admin", ADMIN_PASSWORD).await;
    let resp = send(&t.app, authed("GET", "/api/users/not-a-uuid", &admin, None)).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(resp).await["error"], "validation_error");

    let resp = send(&t.app, authed("GET", "/api/users?page=abc", &admin, None)).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(resp).await["error"], "validation_error");

    let uri = format!("/api/courses/{}/contents", Uuid::new_v4());
    let resp = send(&t.app, authed("POST", &uri, &admin, Some(json!({"name": "x"})))).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(resp).await["error"], "validation_error");
}

#[tokio::test]
async fn postgres_backed_state_builds_router() {
    let config = test_config();
    let pool = lazy_pool(&config);
    let app = router(AppState::new(pool, config));
    let resp = send(&app, Request::get("/api/health").body(Body::empty()).unwrap()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["dbConnected"], false);
}

#[tokio::test]
async fn protected_routes_reject_bad_bearer() {
    let t = test_app().await;
    let resp = send(&t.app, authed("GET", "/api/users", "not-a-jwt", None)).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(resp).await["error"], "unauthorized");
}

#[tokio::test]
async fn user_admin_routes_enforce_roles() {
    let t = test_app().await;
    let (admin, _) = login(&t.app, "admin", ADMIN_PASSWORD).await;
    let (bob, _) = login(&t.app, "bob", BOB_PASSWORD).await;

    let resp = send(&t.app, authed("GET", "/api/users", &bob, None)).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = send(&t.app, authed("GET", "/api/users?sort=username&order=asc", &admin, None)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["meta"]["total"], 2);
    assert_eq!(body["data"][0]["username"], "admin");

    let resp = send(&t.app, authed("GET", "/api/users?limit=500", &admin, None)).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // Bob can read himself but nobody else.
    let own = format!("/api/users/{}", t.bob.id);
    let resp = send(&t.app, authed("GET", &own, &bob, None)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let other = format!("/api/users/{}", Uuid::new_v4());
    let resp = send(&t.app, authed("GET", &other, &bob, None)).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn create_user_validates_and_detects_conflicts() {
    let t = test_app().await;
    let (admin, _) = login(&t.app, "admin", ADMIN_PASSWORD).await;
    let new_user = |username: &str, password: &str| {
        json!({
            "firstName": "Carol",
            "lastName": "Shaw",
            "username": username,
            "password": password,
            "role": "editor",
        })
    };

    let resp = send(&t.app, authed("POST", "/api/users", &admin, Some(new_user("carol", "river1")))).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    assert_eq!(json_body(resp).await["role"], "editor");

    let resp = send(&t.app, authed("POST", "/api/users", &admin, Some(new_user("carol", "river2")))).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let resp = send(&t.app, authed("POST", "/api/users", &admin, Some(new_user("dave", "short")))).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let (_, _) = login(&t.app, "carol", "river1").await;
}

#[tokio::test]
async fn users_cannot_escalate_their_own_role() {
    let t = test_app().await;
    let (bob, _) = login(&t.app, "bob", BOB_PASSWORD).await;
    let uri = format!("/api/users/{}", t.bob.id);

    let resp = send(&t.app, authed("PUT", &uri, &bob, Some(json!({"role": "admin"})))).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = send(&t.app, authed("PUT", &uri, &bob, Some(json!({"firstName": "Robert"})))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["firstName"], "Robert");
    assert_eq!(body["role"], "user");
}

#[tokio::test]
async fn health_reports_database_state() {
    let t = test_app().await;
    let resp = send(&t.app, Request::get("/api/health").body(Body::empty()).unwrap()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["dbConnected"], false);
}

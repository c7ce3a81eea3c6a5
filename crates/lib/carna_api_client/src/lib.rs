//! HTTP client for the Carna API.
//!
//! The access token is held in memory and sent as a Bearer header. The
//! refresh token stays in the client's cookie jar, exactly as a browser
//! would keep it. When a request comes back `401`, the client refreshes once
//! and replays the request; concurrent failures share a single refresh.

pub mod error;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use carna_core::models::auth::User;
use carna_core::models::catalog::{ContentWithCourse, Stats};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

pub use error::{ClientError, ClientResult};

pub const LOGIN_PATH: &str = "/auth/login";
pub const REFRESH_PATH: &str = "/auth/refresh";
pub const LOGOUT_PATH: &str = "/auth/logout";

/// Body of a successful login or refresh.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthSession {
    pub token: String,
    pub user: User,
}

#[derive(Serialize)]
struct LoginBody<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Paths that must never trigger a refresh of their own.
fn is_session_path(path: &str) -> bool {
    let path = path.split('?').next().unwrap_or(path);
    matches!(path, LOGIN_PATH | REFRESH_PATH | LOGOUT_PATH)
}

#[derive(Default)]
struct SessionState {
    access_token: RwLock<Option<String>>,
    /// Bumped whenever the access token changes.
    epoch: AtomicU64,
    /// Held for the duration of a refresh round trip.
    refresh_flight: Mutex<()>,
}

/// Carna API client. Clones share the cookie jar and the session.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    session: Arc<SessionState>,
}

impl ApiClient {
    /// `base_url` points at the API root, e.g. `http://localhost:8080/api`.
    pub fn new(base_url: &str) -> ClientResult<Self> {
        let http = reqwest::Client::builder().cookie_store(true).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            session: Arc::new(SessionState::default()),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn access_token(&self) -> Option<String> {
        self.session.access_token.read().await.clone()
    }

    /// Replace the in-memory access token.
    pub async fn set_access_token(&self, token: Option<String>) {
        let mut slot = self.session.access_token.write().await;
        *slot = token;
        self.session.epoch.fetch_add(1, Ordering::AcqRel);
    }

    async fn snapshot(&self) -> (Option<String>, u64) {
        let slot = self.session.access_token.read().await;
        (slot.clone(), self.session.epoch.load(Ordering::Acquire))
    }

    pub async fn login(&self, username: &str, password: &str) -> ClientResult<AuthSession> {
        let resp = self
            .http
            .post(self.url(LOGIN_PATH))
            .json(&LoginBody { username, password })
            .send()
            .await?;
        let session: AuthSession = parse(resp).await?;
        self.set_access_token(Some(session.token.clone())).await;
        debug!(user = %session.user.username, "logged in");
        Ok(session)
    }

    /// Exchange the refresh cookie for a new access token.
    pub async fn refresh(&self) -> ClientResult<AuthSession> {
        let _flight = self.session.refresh_flight.lock().await;
        self.refresh_locked().await
    }

    async fn refresh_locked(&self) -> ClientResult<AuthSession> {
        let result = match self.http.post(self.url(REFRESH_PATH)).send().await {
            Ok(resp) => parse::<AuthSession>(resp).await,
            Err(e) => Err(e.into()),
        };
        match result {
            Ok(session) => {
                self.set_access_token(Some(session.token.clone())).await;
                debug!("access token refreshed");
                Ok(session)
            }
            Err(e) => {
                warn!(error = %e, "refresh failed, clearing session");
                self.set_access_token(None).await;
                Err(e)
            }
        }
    }

    /// End the session on the server and forget the local token. The local
    /// token is dropped even when the server call fails.
    pub async fn logout(&self) -> ClientResult<()> {
        let token = self.access_token().await;
        let mut req = self.http.post(self.url(LOGOUT_PATH));
        if let Some(token) = &token {
            req = req.bearer_auth(token);
        }
        let result = req.send().await;
        self.set_access_token(None).await;
        let _: bool = parse(result?).await?;
        Ok(())
    }

    /// Refresh after a `401`, unless a refresh already landed since the
    /// request observed `seen_epoch`.
    async fn recover(&self, seen_epoch: u64) -> ClientResult<()> {
        let _flight = self.session.refresh_flight.lock().await;
        if self.session.epoch.load(Ordering::Acquire) != seen_epoch {
            return match self.access_token().await {
                Some(_) => Ok(()),
                None => Err(ClientError::SessionExpired),
            };
        }
        self.refresh_locked().await.map(|_| ())
    }

    /// Send a request built by `build`, refreshing and replaying once on 401.
    async fn execute<F>(&self, path: &str, build: F) -> ClientResult<Response>
    where
        F: Fn(&reqwest::Client, String) -> RequestBuilder,
    {
        let (token, epoch) = self.snapshot().await;
        let resp = self.dispatch(path, &build, token.as_deref()).await?;
        if resp.status() != StatusCode::UNAUTHORIZED || is_session_path(path) {
            return Ok(resp);
        }

        debug!(path, "request unauthorized, refreshing");
        self.recover(epoch).await?;
        let (token, _) = self.snapshot().await;
        self.dispatch(path, &build, token.as_deref()).await
    }

    async fn dispatch<F>(&self, path: &str, build: &F, token: Option<&str>) -> ClientResult<Response>
    where
        F: Fn(&reqwest::Client, String) -> RequestBuilder,
    {
        let mut req = build(&self.http, self.url(path));
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        Ok(req.send().await?)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        parse(self.execute(path, |http, url| http.get(url)).await?).await
    }

    pub async fn get_query<Q, T>(&self, path: &str, query: &Q) -> ClientResult<T>
    where
        Q: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        parse(
            self.execute(path, |http, url| http.get(url).query(query))
                .await?,
        )
        .await
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> ClientResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        parse(self.execute(path, |http, url| http.post(url).json(body)).await?).await
    }

    pub async fn put<B, T>(&self, path: &str, body: &B) -> ClientResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        parse(self.execute(path, |http, url| http.put(url).json(body)).await?).await
    }

    /// `DELETE`; any success status counts, the body is ignored.
    pub async fn delete(&self, path: &str) -> ClientResult<()> {
        let resp = self.execute(path, |http, url| http.delete(url)).await?;
        check(resp).await.map(|_| ())
    }

    pub async fn stats(&self) -> ClientResult<Stats> {
        self.get("/stats").await
    }

    pub async fn latest_contents(&self, limit: i64) -> ClientResult<Vec<ContentWithCourse>> {
        self.get_query("/contents/latest", &[("limit", limit)]).await
    }
}

/// Turn a non-success response into [`ClientError::Api`].
async fn check(resp: Response) -> ClientResult<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let text = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|b| b.message)
        .unwrap_or(text);
    Err(ClientError::Api { status, message })
}

async fn parse<T: DeserializeOwned>(resp: Response) -> ClientResult<T> {
    let resp = check(resp).await?;
    let bytes = resp.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| ClientError::Decode(e.to_string()))
}

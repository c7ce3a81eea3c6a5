//! Authentication request handlers.
//!
//! The access token goes in the JSON body; the refresh token only ever
//! travels in the httpOnly cookie built by [`CookiePolicy`].
//!
//! [`CookiePolicy`]: crate::services::cookies::CookiePolicy

use axum::Extension;
use axum::extract::State;
use axum_extra::extract::cookie::CookieJar;
use carna_core::auth::session::Session;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::extract::Json;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{AuthResponse, LoginRequest};
use crate::services::cookies::CookiePolicy;

fn respond(state: &AppState, jar: CookieJar, session: Session) -> (CookieJar, Json<AuthResponse>) {
    let jar = jar.add(state.cookies.refresh_cookie(&session.refresh_token));
    (
        jar,
        Json(AuthResponse {
            token: session.access_token,
            user: session.user,
        }),
    )
}

/// `POST /api/auth/login`: authenticate with username + password.
pub async fn login_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<LoginRequest>,
) -> AppResult<(CookieJar, Json<AuthResponse>)> {
    let session = state.sessions.login(&body.username, &body.password).await?;
    Ok(respond(&state, jar, session))
}

/// `POST /api/auth/refresh`: rotate the refresh cookie and mint a new
/// access token. Any failure clears the cookie.
pub async fn refresh_handler(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<AuthResponse>), (CookieJar, AppError)> {
    let presented = CookiePolicy::read(&jar);
    match state.sessions.refresh(presented.as_deref()).await {
        Ok(session) => Ok(respond(&state, jar, session)),
        Err(e) => {
            let jar = jar.add(state.cookies.clear_cookie());
            Err((jar, AppError::from(e)))
        }
    }
}

/// `POST /api/auth/logout`: end the caller's session. Requires authentication.
pub async fn logout_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    jar: CookieJar,
) -> AppResult<(CookieJar, Json<bool>)> {
    state.sessions.logout(user.user_id()?).await?;
    Ok((jar.add(state.cookies.clear_cookie()), Json(true)))
}

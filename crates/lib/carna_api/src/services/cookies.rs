//! Refresh-token cookie policy.
//!
//! Setting and clearing go through the same [`CookiePolicy`] value so the
//! browser always matches the clearing cookie to the one it holds.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use time::Duration;

use crate::config::ApiConfig;

/// Cookie name for the refresh token.
pub const REFRESH_COOKIE: &str = "refresh-token";

/// Path the refresh cookie is scoped to.
pub const REFRESH_COOKIE_PATH: &str = "/api";

/// Attributes of the refresh cookie.
#[derive(Debug, Clone)]
pub struct CookiePolicy {
    secure: bool,
    max_age: Duration,
}

impl CookiePolicy {
    pub fn new(secure: bool, refresh_ttl: std::time::Duration) -> Self {
        Self {
            secure,
            max_age: Duration::try_from(refresh_ttl).unwrap_or(Duration::MAX),
        }
    }

    pub fn from_config(config: &ApiConfig) -> Self {
        Self::new(config.cookie_secure, config.auth.refresh_ttl)
    }

    fn build(&self, value: String, max_age: Duration) -> Cookie<'static> {
        Cookie::build((REFRESH_COOKIE, value))
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .path(REFRESH_COOKIE_PATH)
            .max_age(max_age)
            .build()
    }

    /// Cookie carrying a freshly issued refresh token.
    pub fn refresh_cookie(&self, token: &str) -> Cookie<'static> {
        self.build(token.to_string(), self.max_age)
    }

    /// Expired cookie with the same attributes, clearing the refresh token.
    pub fn clear_cookie(&self) -> Cookie<'static> {
        self.build(String::new(), Duration::ZERO)
    }

    /// Refresh token presented by the client, if any.
    pub fn read(jar: &CookieJar) -> Option<String> {
        jar.get(REFRESH_COOKIE).map(|c| c.value().to_string())
    }
}

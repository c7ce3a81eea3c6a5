//! Session configuration: token secrets, lifetimes and hashing cost.
//!
//! Built once at process start and passed into [`TokenCodec`] and
//! [`SessionManager`]; nothing in the session path reads the environment.
//!
//! [`TokenCodec`]: super::jwt::TokenCodec
//! [`SessionManager`]: super::session::SessionManager

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use thiserror::Error;
use tracing::{info, warn};

/// Access token lifetime when `JWT_ACCESS_EXPIRES` is unset.
pub const DEFAULT_ACCESS_TTL: &str = "15m";

/// Refresh token lifetime when `JWT_REFRESH_EXPIRES` is unset.
pub const DEFAULT_REFRESH_TTL: &str = "30d";

/// bcrypt cost when `BCRYPT_ROUNDS` is unset.
pub const DEFAULT_BCRYPT_COST: u32 = 10;

/// Configuration errors surfaced at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var}: {reason}")]
    Invalid { var: &'static str, reason: String },

    #[error("access and refresh secrets must differ")]
    SharedSecret,

    #[error("{0} must not be empty")]
    EmptySecret(&'static str),
}

/// Secrets and lifetimes for the two token kinds.
#[derive(Clone)]
pub struct AuthConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub bcrypt_cost: u32,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("access_secret", &"<redacted>")
            .field("refresh_secret", &"<redacted>")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .finish()
    }
}

impl AuthConfig {
    /// Create a config with default lifetimes and cost.
    pub fn new(
        access_secret: impl Into<String>,
        refresh_secret: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            access_secret: access_secret.into(),
            refresh_secret: refresh_secret.into(),
            access_ttl: Duration::from_secs(15 * 60),
            refresh_ttl: Duration::from_secs(30 * 24 * 60 * 60),
            bcrypt_cost: DEFAULT_BCRYPT_COST,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_ttls(mut self, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        self.access_ttl = access_ttl;
        self.refresh_ttl = refresh_ttl;
        self
    }

    pub fn with_bcrypt_cost(mut self, cost: u32) -> Self {
        self.bcrypt_cost = cost;
        self
    }

    /// Reads configuration from environment variables.
    ///
    /// | Variable              | Default                          |
    /// |-----------------------|----------------------------------|
    /// | `JWT_SECRET`          | generated & persisted to file    |
    /// | `JWT_REFRESH_SECRET`  | generated & persisted to file    |
    /// | `JWT_ACCESS_EXPIRES`  | `15m`                            |
    /// | `JWT_REFRESH_EXPIRES` | `30d`                            |
    /// | `BCRYPT_ROUNDS`       | `10`                             |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`AuthConfig::from_env`] with an injectable variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let access_secret =
            non_empty("JWT_SECRET").unwrap_or_else(|| resolve_persisted_secret("jwt-secret"));
        let refresh_secret = non_empty("JWT_REFRESH_SECRET")
            .unwrap_or_else(|| resolve_persisted_secret("jwt-refresh-secret"));

        let access_ttl = parse_ttl(
            "JWT_ACCESS_EXPIRES",
            &non_empty("JWT_ACCESS_EXPIRES").unwrap_or_else(|| DEFAULT_ACCESS_TTL.into()),
        )?;
        let refresh_ttl = parse_ttl(
            "JWT_REFRESH_EXPIRES",
            &non_empty("JWT_REFRESH_EXPIRES").unwrap_or_else(|| DEFAULT_REFRESH_TTL.into()),
        )?;

        let bcrypt_cost = match non_empty("BCRYPT_ROUNDS") {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
                var: "BCRYPT_ROUNDS",
                reason: format!("'{raw}' is not a number"),
            })?,
            None => DEFAULT_BCRYPT_COST,
        };

        let config = Self {
            access_secret,
            refresh_secret,
            access_ttl,
            refresh_ttl,
            bcrypt_cost,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check invariants the codec relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.access_secret.is_empty() {
            return Err(ConfigError::EmptySecret("JWT_SECRET"));
        }
        if self.refresh_secret.is_empty() {
            return Err(ConfigError::EmptySecret("JWT_REFRESH_SECRET"));
        }
        if self.access_secret == self.refresh_secret {
            return Err(ConfigError::SharedSecret);
        }
        if !(4..=31).contains(&self.bcrypt_cost) {
            return Err(ConfigError::Invalid {
                var: "BCRYPT_ROUNDS",
                reason: format!("{} is outside 4..=31", self.bcrypt_cost),
            });
        }
        Ok(())
    }
}

/// Parse a lifetime such as `15m`, `12h` or `30d`.
pub fn parse_ttl(var: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    let ttl = humantime::parse_duration(raw.trim()).map_err(|e| ConfigError::Invalid {
        var,
        reason: format!("'{raw}': {e}"),
    })?;
    if ttl.is_zero() {
        return Err(ConfigError::Invalid {
            var,
            reason: "lifetime must be positive".into(),
        });
    }
    Ok(ttl)
}

/// Read a persisted secret from the data dir, generating it on first use.
fn resolve_persisted_secret(file_name: &str) -> String {
    let secret_path = secret_path(file_name);
    if let Ok(existing) = std::fs::read_to_string(&secret_path) {
        let trimmed = existing.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    let secret: String = rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect();
    if let Some(parent) = secret_path.parent()
        && let Err(e) = std::fs::create_dir_all(parent)
    {
        warn!(path = %parent.display(), error = %e, "could not create secret directory");
    }
    match std::fs::write(&secret_path, &secret) {
        Ok(()) => info!(path = %secret_path.display(), "generated new token secret"),
        Err(e) => warn!(
            path = %secret_path.display(),
            error = %e,
            "could not persist token secret; sessions will not survive a restart"
        ),
    }
    secret
}

/// Path to a persisted secret file.
fn secret_path(file_name: &str) -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("carna")
        .join(file_name)
}

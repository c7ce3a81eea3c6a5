//! API server configuration.

use std::path::PathBuf;

use carna_core::auth::config::{AuthConfig, ConfigError};

/// Origin allowed by default outside production (the SPA dev server).
pub const DEV_ORIGIN: &str = "http://localhost:3000";

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:5000").
    pub bind_addr: String,
    /// PostgreSQL connection URL.
    pub pg_connection_url: String,
    /// Token secrets, lifetimes and bcrypt cost.
    pub auth: AuthConfig,
    /// Whether the refresh cookie carries the `Secure` attribute.
    pub cookie_secure: bool,
    /// Directory uploaded content images are written to.
    pub upload_dir: PathBuf,
    /// Origins allowed to make credentialed cross-origin requests.
    pub cors_origins: Vec<String>,
    /// `production` disables development defaults.
    pub app_env: String,
}

impl ApiConfig {
    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable        | Default                                     |
    /// |-----------------|---------------------------------------------|
    /// | `BIND_ADDR`     | `127.0.0.1:5000`                            |
    /// | `DATABASE_URL`  | `postgres://localhost:5432/carna`           |
    /// | `COOKIE_SECURE` | `false`                                     |
    /// | `UPLOAD_DIR`    | `shared/upload`                             |
    /// | `CORS_ORIGINS`  | empty (comma separated)                     |
    /// | `APP_ENV`       | `development`                               |
    ///
    /// Token settings are read by [`AuthConfig::from_lookup`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ApiConfig::from_env`] with an injectable variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let cookie_secure = match get("COOKIE_SECURE") {
            Some(raw) => parse_bool("COOKIE_SECURE", &raw)?,
            None => false,
        };
        let app_env = get("APP_ENV").unwrap_or_else(|| "development".into());

        let mut cors_origins: Vec<String> = get("CORS_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(|o| o.trim().trim_end_matches('/').to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();
        if app_env != "production" && !cors_origins.iter().any(|o| o == DEV_ORIGIN) {
            cors_origins.push(DEV_ORIGIN.into());
        }

        Ok(Self {
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| "127.0.0.1:5000".into()),
            pg_connection_url: get("DATABASE_URL")
                .unwrap_or_else(|| "postgres://localhost:5432/carna".into()),
            auth: AuthConfig::from_lookup(&lookup)?,
            cookie_secure,
            upload_dir: get("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("shared/upload")),
            cors_origins,
            app_env,
        })
    }

    pub fn is_production(&self) -> bool {
        self.app_env == "production"
    }
}

fn parse_bool(var: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::Invalid {
            var,
            reason: format!("'{other}' is not a boolean"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const SECRETS: [(&str, &str); 2] = [("JWT_SECRET", "a-secret"), ("JWT_REFRESH_SECRET", "r-secret")];

    #[test]
    fn defaults_apply() {
        let config = ApiConfig::from_lookup(lookup(&SECRETS)).unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:5000");
        assert!(!config.cookie_secure);
        assert_eq!(config.upload_dir, PathBuf::from("shared/upload"));
        assert_eq!(config.cors_origins, vec![DEV_ORIGIN.to_string()]);
        assert!(!config.is_production());
    }

    #[test]
    fn production_drops_dev_origin() {
        let mut pairs = SECRETS.to_vec();
        pairs.push(("APP_ENV", "production"));
        pairs.push(("CORS_ORIGINS", "https://carna.example/, https://admin.carna.example"));
        pairs.push(("COOKIE_SECURE", "true"));
        let config = ApiConfig::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(
            config.cors_origins,
            vec!["https://carna.example", "https://admin.carna.example"]
        );
        assert!(config.cookie_secure);
    }

    #[test]
    fn bad_boolean_is_rejected() {
        let mut pairs = SECRETS.to_vec();
        pairs.push(("COOKIE_SECURE", "maybe"));
        assert!(ApiConfig::from_lookup(lookup(&pairs)).is_err());
    }
}

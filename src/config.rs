// src/config.rs

use std::{env, fmt, path::PathBuf};

use dotenvy::dotenv;
use thiserror::Error;
use url::Url;

const DEFAULT_DATABASE_URL: &str = "sqlite://data/docverify.db";
const DEFAULT_AI_ML_SERVICE_URL: &str = "http://localhost:8000";
const DEFAULT_UPLOAD_DIR: &str = "uploads/documents";
/// 7 days.
const DEFAULT_JWT_EXPIRATION: u64 = 7 * 24 * 60 * 60;
/// 10 MiB.
const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
const DEFAULT_PORT: u16 = 5001;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    /// Token lifetime in seconds.
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
    pub ai_ml_service_url: String,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub port: u16,
    pub cors_origin: Option<String>,
}

/// Raised when the environment is missing a required variable or holds a malformed one.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key} is invalid: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    /// `from_env` passes the process environment; tests pass a map.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database_url = get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

        let jwt_secret = get("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;

        let jwt_expiration = parse_or("JWT_EXPIRATION", get("JWT_EXPIRATION"), DEFAULT_JWT_EXPIRATION)?;

        let rust_log = get("RUST_LOG").unwrap_or_else(|| "info".to_string());

        let ai_ml_service_url = get("AI_ML_SERVICE_URL")
            .unwrap_or_else(|| DEFAULT_AI_ML_SERVICE_URL.to_string());
        Url::parse(&ai_ml_service_url).map_err(|e| ConfigError::Invalid {
            key: "AI_ML_SERVICE_URL",
            reason: e.to_string(),
        })?;

        let upload_dir = get("UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_UPLOAD_DIR));

        let max_upload_bytes =
            parse_or("MAX_UPLOAD_BYTES", get("MAX_UPLOAD_BYTES"), DEFAULT_MAX_UPLOAD_BYTES)?;

        let port = parse_or("PORT", get("PORT"), DEFAULT_PORT)?;

        Ok(Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            rust_log,
            admin_email: get("ADMIN_EMAIL"),
            admin_password: get("ADMIN_PASSWORD"),
            ai_ml_service_url: ai_ml_service_url.trim_end_matches('/').to_string(),
            upload_dir,
            max_upload_bytes,
            port,
            cors_origin: get("CORS_ORIGIN"),
        })
    }
}

fn parse_or<T>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    match raw {
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_secret_is_set() {
        let config = Config::from_lookup(lookup(&[("JWT_SECRET", "s3cret")])).unwrap();

        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.jwt_expiration, 604800);
        assert_eq!(config.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(config.port, 5001);
        assert_eq!(config.ai_ml_service_url, "http://localhost:8000");
        assert!(config.admin_email.is_none());
    }

    #[test]
    fn missing_secret_is_an_error() {
        let err = Config::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("JWT_SECRET")));
        assert_eq!(err.to_string(), "JWT_SECRET must be set");
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        let err = Config::from_lookup(lookup(&[("JWT_SECRET", "x"), ("PORT", "eighty")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "PORT", .. }));
        assert!(err.to_string().starts_with("PORT is invalid: "));
    }

    #[test]
    fn service_url_must_parse_and_loses_trailing_slash() {
        let err = Config::from_lookup(lookup(&[("JWT_SECRET", "x"), ("AI_ML_SERVICE_URL", "not a url")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "AI_ML_SERVICE_URL", .. }));

        let config = Config::from_lookup(lookup(&[
            ("JWT_SECRET", "x"),
            ("AI_ML_SERVICE_URL", "http://ai.internal:9000/"),
        ]))
        .unwrap();
        assert_eq!(config.ai_ml_service_url, "http://ai.internal:9000");
    }
}

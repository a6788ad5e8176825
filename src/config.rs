//! Configuration management for the three services.
//!
//! Each service reads its own environment variables:
//!
//! Identity service:
//! - `IDENTITY_HOST` / `IDENTITY_PORT` - Optional. Defaults to `127.0.0.1:5000`.
//! - `IDENTITY_DB_PATH` - Optional. SQLite file. Defaults to `identity_service.db`.
//! - `JWT_SECRET_KEY` - Required. HS256 signing secret.
//! - `JWT_EXPIRATION_HOURS` - Optional. Token lifetime. Defaults to `24`.
//! - `PASSWORD_HASH_ITERATIONS` - Optional. PBKDF2 rounds. Defaults to `100000`.
//!
//! Crypto service:
//! - `CRYPTO_HOST` / `CRYPTO_PORT` - Optional. Defaults to `127.0.0.1:5002`.
//! - `CRYPTO_KEY_PATH` - Optional. Key file. Defaults to `crypto_service.key`.
//!
//! Secret store:
//! - `STORE_HOST` / `STORE_PORT` - Optional. Defaults to `127.0.0.1:5001`.
//! - `STORE_DB_PATH` - Optional. SQLite file. Defaults to `secret_store.db`.
//! - `IDENTITY_SERVICE_URL` - Optional. Defaults to `http://127.0.0.1:5000`.
//! - `CRYPTO_SERVICE_URL` - Optional. Defaults to `http://127.0.0.1:5002`.
//! - `UPSTREAM_TIMEOUT_SECS` - Optional. Per-call timeout. Defaults to `5`.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_parse<T>(name: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_or(name, default)
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidValue(name.to_string(), e.to_string()))
}

fn trim_url(url: String) -> String {
    url.trim().trim_end_matches('/').to_string()
}

/// Identity service configuration.
#[derive(Debug, Clone)]
pub struct IdentityConfig {
    pub host: String,
    pub port: u16,

    /// SQLite database holding the `users` table
    pub database_path: PathBuf,

    /// Shared HS256 secret used to sign and verify tokens
    pub jwt_secret: String,

    /// Token lifetime in hours
    pub token_ttl_hours: i64,

    /// PBKDF2 rounds for newly hashed login passwords
    pub password_iterations: u32,
}

impl IdentityConfig {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if `JWT_SECRET_KEY` is not set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let jwt_secret = std::env::var("JWT_SECRET_KEY")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("JWT_SECRET_KEY".to_string()))?;

        let token_ttl_hours: i64 = env_parse("JWT_EXPIRATION_HOURS", "24")?;
        if token_ttl_hours <= 0 {
            return Err(ConfigError::InvalidValue(
                "JWT_EXPIRATION_HOURS".to_string(),
                "must be positive".to_string(),
            ));
        }

        Ok(Self {
            host: env_or("IDENTITY_HOST", "127.0.0.1"),
            port: env_parse("IDENTITY_PORT", "5000")?,
            database_path: PathBuf::from(env_or("IDENTITY_DB_PATH", "identity_service.db")),
            jwt_secret,
            token_ttl_hours,
            password_iterations: env_parse("PASSWORD_HASH_ITERATIONS", "100000")?,
        })
    }

    /// Create a config with custom values (useful for testing).
    pub fn new(database_path: PathBuf, jwt_secret: impl Into<String>) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            database_path,
            jwt_secret: jwt_secret.into(),
            token_ttl_hours: 24,
            password_iterations: crate::identity::password::DEFAULT_ITERATIONS,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Crypto service configuration.
#[derive(Debug, Clone)]
pub struct CryptoConfig {
    pub host: String,
    pub port: u16,

    /// File holding the symmetric key (created on first start)
    pub key_path: PathBuf,
}

impl CryptoConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            host: env_or("CRYPTO_HOST", "127.0.0.1"),
            port: env_parse("CRYPTO_PORT", "5002")?,
            key_path: PathBuf::from(env_or("CRYPTO_KEY_PATH", "crypto_service.key")),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Secret store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub host: String,
    pub port: u16,

    /// SQLite database holding the `passwords` table
    pub database_path: PathBuf,

    /// Base URL of the identity service (no trailing slash)
    pub identity_url: String,

    /// Base URL of the crypto service (no trailing slash)
    pub crypto_url: String,

    /// Timeout applied to every upstream call
    pub upstream_timeout: Duration,
}

impl StoreConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let timeout_secs: u64 = env_parse("UPSTREAM_TIMEOUT_SECS", "5")?;
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "UPSTREAM_TIMEOUT_SECS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            host: env_or("STORE_HOST", "127.0.0.1"),
            port: env_parse("STORE_PORT", "5001")?,
            database_path: PathBuf::from(env_or("STORE_DB_PATH", "secret_store.db")),
            identity_url: trim_url(env_or("IDENTITY_SERVICE_URL", "http://127.0.0.1:5000")),
            crypto_url: trim_url(env_or("CRYPTO_SERVICE_URL", "http://127.0.0.1:5002")),
            upstream_timeout: Duration::from_secs(timeout_secs),
        })
    }

    /// Create a config with custom values (useful for testing).
    pub fn new(
        database_path: PathBuf,
        identity_url: impl Into<String>,
        crypto_url: impl Into<String>,
    ) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5001,
            database_path,
            identity_url: trim_url(identity_url.into()),
            crypto_url: trim_url(crypto_url.into()),
            upstream_timeout: Duration::from_secs(5),
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

//! Configuration module for Tavern.

use serde::Deserialize;
use std::path::Path;

use crate::{Result, TavernError};

/// Environment variable holding the server secret.
pub const SECRET_ENV_VAR: &str = "TAVERN_SECRET";

/// Fallback secret used when none is configured.
///
/// Not safe for production: anyone reading the source can reproduce digests.
pub const DEV_SECRET: &str = "tavern-development-secret";

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
    /// Number of pooled connections.
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

fn default_db_path() -> String {
    "data/tavern.db".to_string()
}

fn default_pool_size() -> u32 {
    8
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            pool_size: default_pool_size(),
        }
    }
}

/// Authentication configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Server secret mixed into every password digest.
    #[serde(default)]
    pub secret: String,
    /// Session lifetime in seconds.
    #[serde(default = "default_session_ttl")]
    pub session_ttl_secs: i64,
    /// Password reset token lifetime in seconds.
    #[serde(default = "default_reset_ttl")]
    pub reset_ttl_secs: i64,
    /// Iteration count for newly hashed passwords.
    #[serde(default = "default_password_iterations")]
    pub password_iterations: u32,
    /// Name of the cookie carrying the session token.
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    /// Whether the session cookie is marked `Secure`.
    #[serde(default)]
    pub cookie_secure: bool,
}

/// Default session lifetime (30 days).
pub const DEFAULT_SESSION_TTL_SECS: i64 = 30 * 24 * 60 * 60;

/// Default password reset token lifetime (1 hour).
pub const DEFAULT_RESET_TTL_SECS: i64 = 60 * 60;

/// Longest accepted session or reset lifetime (10 years).
pub const MAX_TTL_SECS: i64 = 10 * 365 * 24 * 60 * 60;

fn default_session_ttl() -> i64 {
    DEFAULT_SESSION_TTL_SECS
}

fn default_reset_ttl() -> i64 {
    DEFAULT_RESET_TTL_SECS
}

fn default_password_iterations() -> u32 {
    crate::auth::DEFAULT_ITERATIONS
}

fn default_cookie_name() -> String {
    "tavern_session".to_string()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            session_ttl_secs: default_session_ttl(),
            reset_ttl_secs: default_reset_ttl(),
            password_iterations: default_password_iterations(),
            cookie_name: default_cookie_name(),
            cookie_secure: false,
        }
    }
}

impl AuthConfig {
    /// Whether no secret was configured and the development fallback is in use.
    pub fn uses_dev_secret(&self) -> bool {
        self.secret.is_empty()
    }

    /// The effective server secret.
    pub fn effective_secret(&self) -> &str {
        if self.uses_dev_secret() {
            DEV_SECRET
        } else {
            &self.secret
        }
    }
}

/// Board display configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BoardConfig {
    /// Topics shown per board page.
    #[serde(default = "default_topics_per_page")]
    pub topics_per_page: i64,
    /// Posts shown per topic page.
    #[serde(default = "default_posts_per_page")]
    pub posts_per_page: i64,
}

fn default_topics_per_page() -> i64 {
    20
}

fn default_posts_per_page() -> i64 {
    20
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            topics_per_page: default_topics_per_page(),
            posts_per_page: default_posts_per_page(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/tavern.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Authentication configuration.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Board display configuration.
    #[serde(default)]
    pub board: BoardConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(TavernError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| TavernError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `TAVERN_SECRET`: Override the server secret
    pub fn apply_env_overrides(&mut self) {
        if let Ok(secret) = std::env::var(SECRET_ENV_VAR) {
            self.apply_secret_override(&secret);
        }
    }

    fn apply_secret_override(&mut self, secret: &str) {
        if !secret.is_empty() {
            self.auth.secret = secret.to_string();
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.database.pool_size == 0 {
            return Err(TavernError::Config(
                "database.pool_size must be at least 1".to_string(),
            ));
        }
        if self.auth.password_iterations == 0 {
            return Err(TavernError::Config(
                "auth.password_iterations must be at least 1".to_string(),
            ));
        }
        for (name, secs) in [
            ("auth.session_ttl_secs", self.auth.session_ttl_secs),
            ("auth.reset_ttl_secs", self.auth.reset_ttl_secs),
        ] {
            if !(1..=MAX_TTL_SECS).contains(&secs) {
                return Err(TavernError::Config(format!(
                    "{name} must be between 1 and {MAX_TTL_SECS}"
                )));
            }
        }
        if self.auth.cookie_name.trim().is_empty() {
            return Err(TavernError::Config(
                "auth.cookie_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

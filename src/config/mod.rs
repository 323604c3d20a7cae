//! Configuration management for youdo-api
//!
//! This module handles loading, parsing, and validating application configuration
//! from YAML files and environment variables.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::auth::ratelimit;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Session token configuration
    #[serde(default)]
    pub auth: AuthConfig,

    /// Per-client request admission
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Password hashing cost
    #[serde(default)]
    pub password: PasswordConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// CORS configuration
    #[serde(default)]
    pub cors: CorsConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileRead(format!("Failed to read config file: {}", e)))?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        // First, expand environment variables in the YAML string
        let expanded = expand_env_vars(yaml);
        serde_yaml::from_str(&expanded)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse YAML: {}", e)))
    }

    /// Load configuration from environment variables with prefix YOUDO_
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup
    ///
    /// Unset variables keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        // Server
        if let Some(host) = lookup("YOUDO_SERVER_HOST") {
            config.server.host = host;
        }
        if let Some(port) = lookup("YOUDO_SERVER_PORT") {
            config.server.port = parse_var("YOUDO_SERVER_PORT", &port)?;
        }
        if let Some(trust) = lookup("YOUDO_SERVER_TRUST_FORWARDED_FOR") {
            config.server.trust_forwarded_for = parse_var("YOUDO_SERVER_TRUST_FORWARDED_FOR", &trust)?;
        }

        // Auth
        if let Some(secret) = lookup("YOUDO_AUTH_JWT_SECRET") {
            config.auth.jwt_secret = secret;
        }
        if let Some(ttl) = lookup("YOUDO_AUTH_TOKEN_TTL_SECS") {
            config.auth.token_ttl_secs = parse_var("YOUDO_AUTH_TOKEN_TTL_SECS", &ttl)?;
        }

        // Rate limiting
        if let Some(requests) = lookup("YOUDO_RATE_LIMIT_REQUESTS") {
            config.rate_limit.requests = parse_var("YOUDO_RATE_LIMIT_REQUESTS", &requests)?;
        }
        if let Some(window) = lookup("YOUDO_RATE_LIMIT_WINDOW_SECS") {
            config.rate_limit.window_secs = parse_var("YOUDO_RATE_LIMIT_WINDOW_SECS", &window)?;
        }
        if let Some(idle) = lookup("YOUDO_RATE_LIMIT_IDLE_TIMEOUT_SECS") {
            config.rate_limit.idle_timeout_secs =
                parse_var("YOUDO_RATE_LIMIT_IDLE_TIMEOUT_SECS", &idle)?;
        }
        if let Some(sweep) = lookup("YOUDO_RATE_LIMIT_SWEEP_INTERVAL_SECS") {
            config.rate_limit.sweep_interval_secs =
                parse_var("YOUDO_RATE_LIMIT_SWEEP_INTERVAL_SECS", &sweep)?;
        }

        // Database
        if let Some(path) = lookup("YOUDO_DATABASE_PATH") {
            config.database.path = path;
        }

        // CORS, comma separated
        if let Some(origins) = lookup("YOUDO_CORS_ALLOWED_ORIGINS") {
            config.cors.allowed_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(String::from)
                .collect();
        }

        // Logging
        if let Some(level) = lookup("YOUDO_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Some(format) = lookup("YOUDO_LOG_FORMAT") {
            config.logging.format = format;
        }

        Ok(config)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.jwt_secret.trim().is_empty() {
            return Err(ConfigError::MissingRequired("auth.jwt_secret".to_string()));
        }
        if self.auth.token_ttl_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "auth.token_ttl_secs must be greater than 0".to_string(),
            ));
        }
        if self.rate_limit.window_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "rate_limit.window_secs must be greater than 0".to_string(),
            ));
        }
        if self.rate_limit.sweep_interval_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "rate_limit.sweep_interval_secs must be greater than 0".to_string(),
            ));
        }
        if self.rate_limit.idle_timeout_secs <= self.rate_limit.sweep_interval_secs {
            return Err(ConfigError::InvalidValue(
                "rate_limit.idle_timeout_secs must be greater than rate_limit.sweep_interval_secs"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Parse(format!("Invalid value for {}: {}", name, value)))
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Use the first X-Forwarded-For entry as client identifier
    #[serde(default)]
    pub trust_forwarded_for: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            trust_forwarded_for: false,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Session token configuration
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthConfig {
    /// HMAC signing secret, required
    #[serde(default)]
    pub jwt_secret: String,

    /// Token lifetime in seconds
    #[serde(default = "default_token_ttl")]
    pub token_ttl_secs: u64,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("token_ttl_secs", &self.token_ttl_secs)
            .finish()
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            token_ttl_secs: default_token_ttl(),
        }
    }
}

impl AuthConfig {
    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_secs)
    }
}

fn default_token_ttl() -> u64 {
    86400 // 24 hours
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RateLimitConfig {
    /// Requests per window, also the burst size
    #[serde(default = "default_requests")]
    pub requests: u32,

    /// Window length in seconds
    #[serde(default = "default_window")]
    pub window_secs: u64,

    /// Idle time after which a client's bucket is dropped
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Interval between eviction sweeps
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests: default_requests(),
            window_secs: default_window(),
            idle_timeout_secs: default_idle_timeout(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

impl From<&RateLimitConfig> for ratelimit::RateLimitConfig {
    fn from(config: &RateLimitConfig) -> Self {
        Self {
            requests: config.requests,
            window: Duration::from_secs(config.window_secs),
            idle_timeout: Duration::from_secs(config.idle_timeout_secs),
            sweep_interval: Duration::from_secs(config.sweep_interval_secs),
        }
    }
}

fn default_requests() -> u32 {
    100
}

fn default_window() -> u64 {
    60
}

fn default_idle_timeout() -> u64 {
    180
}

fn default_sweep_interval() -> u64 {
    60
}

/// Argon2 cost parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PasswordConfig {
    /// Memory cost in KiB
    #[serde(default = "default_memory_kib")]
    pub memory_kib: u32,

    /// Number of passes
    #[serde(default = "default_iterations")]
    pub iterations: u32,

    /// Degree of parallelism
    #[serde(default = "default_parallelism")]
    pub parallelism: u32,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            memory_kib: default_memory_kib(),
            iterations: default_iterations(),
            parallelism: default_parallelism(),
        }
    }
}

fn default_memory_kib() -> u32 {
    argon2::Params::DEFAULT_M_COST
}

fn default_iterations() -> u32 {
    argon2::Params::DEFAULT_T_COST
}

fn default_parallelism() -> u32 {
    argon2::Params::DEFAULT_P_COST
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    #[serde(default = "default_database_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    "youdo.db".to_string()
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CorsConfig {
    /// Origins allowed to make cross-origin requests
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: default_allowed_origins(),
        }
    }
}

fn default_allowed_origins() -> Vec<String> {
    vec!["http://localhost:3000".to_string()]
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

/// Configuration error types
#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum ConfigError {
    /// Error reading configuration file
    #[error("Failed to read configuration file: {0}")]
    FileRead(String),

    /// Error parsing configuration
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    /// Invalid configuration value
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// Missing required configuration
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

/// Expand environment variables in a string
///
/// Supports `${VAR_NAME}` syntax
fn expand_env_vars(input: &str) -> String {
    let re = match regex_lite::Regex::new(r"\$\{([^}]+)\}") {
        Ok(re) => re,
        Err(_) => return input.to_string(),
    };

    re.replace_all(input, |caps: &regex_lite::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_else(|_| caps[0].to_string())
    })
    .into_owned()
}

//! Configuration management
//!
//! This module handles loading and parsing configuration for Cinevault.
//! Configuration can be loaded from:
//! - config.yml file
//! - Environment variables (override file settings)
//!
//! Missing optional values are filled with sensible defaults.

use serde::{Deserialize, Serialize};

/// Minimum length of a configured session secret, in bytes
pub const MIN_SESSION_SECRET_LEN: usize = 16;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Session configuration
    #[serde(default)]
    pub session: SessionConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database driver (sqlite or mysql)
    #[serde(default)]
    pub driver: DatabaseDriver,
    /// Database connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::default(),
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "data/cinevault.db".to_string()
}

/// Database driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    /// SQLite (default)
    #[default]
    Sqlite,
    /// MySQL
    Mysql,
}

impl DatabaseDriver {
    /// Guess the driver from a connection URL, if the scheme names one
    pub fn from_url(url: &str) -> Option<Self> {
        if url.starts_with("mysql://") {
            Some(Self::Mysql)
        } else if url.starts_with("sqlite:") {
            Some(Self::Sqlite)
        } else {
            None
        }
    }
}

/// Session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Key used to HMAC-sign the session and flash cookies.
    ///
    /// Empty means "generate one at startup"; sessions then do not survive
    /// a restart.
    #[serde(default)]
    pub secret: String,
    /// Maximum session age in days, counted from login
    #[serde(default = "default_max_age_days")]
    pub max_age_days: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            max_age_days: default_max_age_days(),
        }
    }
}

fn default_max_age_days() -> i64 {
    7
}

impl SessionConfig {
    /// Session lifetime in seconds (also used as the cookie Max-Age)
    pub fn max_age_seconds(&self) -> i64 {
        self.max_age_days * 24 * 60 * 60
    }
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError {
        path: String,
        message: String,
    },
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl Config {
    /// Load configuration from file
    ///
    /// If the file doesn't exist, returns default configuration.
    /// If the file exists but is invalid YAML, returns an error with details.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(&content).map_err(|e| {
            ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            }
        })?;

        Ok(config)
    }

    /// Load configuration from file with environment variable overrides
    ///
    /// Environment variables:
    /// - CINEVAULT_SERVER_HOST
    /// - CINEVAULT_SERVER_PORT, PORT
    /// - CINEVAULT_DATABASE_DRIVER
    /// - CINEVAULT_DATABASE_URL, DATABASE_URL
    /// - CINEVAULT_SESSION_SECRET, SESSION_SECRET
    /// - CINEVAULT_SESSION_MAX_AGE_DAYS
    ///
    /// The unprefixed names win over the prefixed ones.
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Check values that serde cannot check on its own
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.session.secret.is_empty()
            && self.session.secret.len() < MIN_SESSION_SECRET_LEN
        {
            return Err(ConfigError::ValidationError(format!(
                "session.secret must be at least {} bytes",
                MIN_SESSION_SECRET_LEN
            )));
        }
        if !(1..=30).contains(&self.session.max_age_days) {
            return Err(ConfigError::ValidationError(format!(
                "session.max_age_days must be between 1 and 30, got {}",
                self.session.max_age_days
            )));
        }
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "database.url must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply environment variable overrides to the configuration
    fn apply_env_overrides(&mut self) {
        // Server configuration
        if let Ok(host) = std::env::var("CINEVAULT_SERVER_HOST") {
            self.server.host = host;
        }
        for key in ["CINEVAULT_SERVER_PORT", "PORT"] {
            if let Ok(port) = std::env::var(key) {
                if let Ok(port) = port.parse::<u16>() {
                    self.server.port = port;
                }
            }
        }

        // Database configuration
        if let Ok(driver) = std::env::var("CINEVAULT_DATABASE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "sqlite" => self.database.driver = DatabaseDriver::Sqlite,
                "mysql" => self.database.driver = DatabaseDriver::Mysql,
                _ => {} // Ignore invalid values
            }
        }
        for key in ["CINEVAULT_DATABASE_URL", "DATABASE_URL"] {
            if let Ok(url) = std::env::var(key) {
                if let Some(driver) = DatabaseDriver::from_url(&url) {
                    self.database.driver = driver;
                }
                self.database.url = url;
            }
        }

        // Session configuration
        for key in ["CINEVAULT_SESSION_SECRET", "SESSION_SECRET"] {
            if let Ok(secret) = std::env::var(key) {
                self.session.secret = secret;
            }
        }
        if let Ok(days) = std::env::var("CINEVAULT_SESSION_MAX_AGE_DAYS") {
            if let Ok(days) = days.parse::<i64>() {
                if (1..=30).contains(&days) {
                    self.session.max_age_days = days;
                }
            }
        }
    }
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

// Shared mutex for all config tests that modify environment variables.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
const ENV_KEYS: &[&str] = &[
    "CINEVAULT_SERVER_HOST",
    "CINEVAULT_SERVER_PORT",
    "PORT",
    "CINEVAULT_DATABASE_DRIVER",
    "CINEVAULT_DATABASE_URL",
    "DATABASE_URL",
    "CINEVAULT_SESSION_SECRET",
    "SESSION_SECRET",
    "CINEVAULT_SESSION_MAX_AGE_DAYS",
];

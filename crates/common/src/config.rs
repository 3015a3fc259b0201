//! Configuration types for the finalize node.
//!
//! Configuration is loaded from a TOML file and may be overridden through
//! environment variables prefixed with `FINALIZE_`.
//!
//! # Example Configuration (TOML)
//!
//! ```toml
//! [database]
//! path = "finalize.db"
//! pool_size = 10
//!
//! [logging]
//! level = "info"
//! format = "text"
//!
//! [finalize]
//! bootstrap_builtin = true
//! log_mismatch_details = true
//! ```
//!
//! # Loading Configuration
//!
//! ```rust,no_run
//! use finalize_common::Config;
//! use std::path::Path;
//!
//! let config = Config::from_file(Path::new("config.toml"))
//!     .unwrap()
//!     .with_env_overrides();
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable overriding [`DatabaseConfig::path`].
pub const ENV_DATABASE_PATH: &str = "FINALIZE_DATABASE_PATH";

/// Environment variable overriding [`LoggingConfig::level`].
pub const ENV_LOG_LEVEL: &str = "FINALIZE_LOG_LEVEL";

/// Log levels for filtering log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Parse a level name, case-insensitively. `warning` is accepted for `warn`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "trace" => Some(Self::Trace),
            "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "warn" | "warning" => Some(Self::Warn),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    /// The lowercase name used by `EnvFilter` directives.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Log output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Main configuration for the finalize node.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Database configuration (storage path, pool size).
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration (level and format).
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Finalize engine behavior.
    #[serde(default)]
    pub finalize: FinalizeConfig,
}

/// Database configuration.
///
/// Only SQLite is supported.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file, created if it does not exist.
    #[serde(default = "default_database_path")]
    pub path: PathBuf,

    /// Maximum number of pooled connections.
    ///
    /// Default: 10
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            pool_size: default_pool_size(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter. Default: `Info`
    #[serde(default)]
    pub level: LogLevel,

    /// Log output format. Default: `Text`
    #[serde(default)]
    pub format: LogFormat,
}

/// Finalize engine options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalizeConfig {
    /// Initialize the native credits program and its mappings on startup
    /// when they are missing from the database.
    #[serde(default = "default_true")]
    pub bootstrap_builtin: bool,

    /// Log the full expected and actual operation lists when validation of a
    /// transaction fails.
    #[serde(default = "default_true")]
    pub log_mismatch_details: bool,
}

impl Default for FinalizeConfig {
    fn default() -> Self {
        Self {
            bootstrap_builtin: true,
            log_mismatch_details: true,
        }
    }
}

fn default_database_path() -> PathBuf {
    PathBuf::from("finalize.db")
}

fn default_pool_size() -> u32 {
    10
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or contains invalid TOML.
    pub fn from_file(path: &std::path::Path) -> Result<Self, crate::Error> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, crate::Error> {
        let config: Self =
            toml::from_str(content).map_err(|e| crate::Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `FINALIZE_*` environment overrides from the process environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable source.
    ///
    /// Unknown log level names are ignored.
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(ENV_DATABASE_PATH).filter(|p| !p.trim().is_empty()) {
            self.database.path = PathBuf::from(path.trim());
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL).and_then(|l| LogLevel::parse(l.trim())) {
            self.logging.level = level;
        }
        self
    }

    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.database.pool_size == 0 {
            return Err(crate::Error::Config(
                "database.pool_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Render the default configuration as TOML, for `sample-config`.
    pub fn sample_toml() -> Result<String, crate::Error> {
        toml::to_string_pretty(&Self::default()).map_err(|e| crate::Error::Config(e.to_string()))
    }
}

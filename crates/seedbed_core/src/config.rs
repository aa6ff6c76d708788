//! Environment accessor and store configuration.
//!
//! # Responsibility
//! - Read required process configuration and fail fast when it is absent.
//! - Parse optional tuning knobs into a typed `StoreConfig`.
//!
//! # Invariants
//! - Blank values are treated the same as unset values.
//! - This module never loads `.env` files; binaries do that before calling in.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

/// Connection string for the backing store.
pub const DATABASE_URL_ENV: &str = "SEEDBED_DATABASE_URL";
/// Enables debug-level SQL echo when truthy.
pub const ECHO_SQL_ENV: &str = "SEEDBED_ECHO_SQL";
/// Busy timeout for contended writers, in milliseconds.
pub const BUSY_TIMEOUT_MS_ENV: &str = "SEEDBED_BUSY_TIMEOUT_MS";
/// Upper bound on pooled connections; at least 1.
pub const MAX_CONNECTIONS_ENV: &str = "SEEDBED_MAX_CONNECTIONS";

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_MAX_CONNECTIONS: u32 = 4;

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration lookup/parse error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Required variable is unset or blank.
    Missing(String),
    /// Optional variable is set but cannot be parsed.
    Invalid {
        name: String,
        value: String,
        expected: &'static str,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing(name) => write!(f, "{name} not found"),
            Self::Invalid {
                name,
                value,
                expected,
            } => write!(f, "invalid value `{value}` for {name}; expected {expected}"),
        }
    }
}

impl Error for ConfigError {}

/// Reads a required environment variable.
///
/// # Errors
/// - Returns `ConfigError::Missing` when the variable is unset, not valid
///   unicode, or blank.
pub fn required_env(name: &str) -> ConfigResult<String> {
    optional_env(name).ok_or_else(|| ConfigError::Missing(name.to_string()))
}

/// Reads an optional environment variable, treating blank as unset.
pub fn optional_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Store-level settings consumed by the session manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// `sqlite::memory:`, `:memory:`, `sqlite://<path>`, `sqlite:<path>` or a bare path.
    pub database_url: String,
    /// Logs every statement at `debug` level when set.
    pub echo_sql: bool,
    pub busy_timeout: Duration,
    pub max_connections: u32,
}

impl StoreConfig {
    /// Builds a config with default tuning for the given connection string.
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            echo_sql: false,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }

    /// Private in-memory database, mostly for tests and smoke runs.
    pub fn in_memory() -> Self {
        Self::new("sqlite::memory:")
    }

    /// Reads the store configuration from the process environment.
    ///
    /// # Errors
    /// - `ConfigError::Missing` when `SEEDBED_DATABASE_URL` is absent.
    /// - `ConfigError::Invalid` when an optional knob cannot be parsed.
    pub fn from_env() -> ConfigResult<Self> {
        let mut config = Self::new(required_env(DATABASE_URL_ENV)?);

        if let Some(value) = optional_env(ECHO_SQL_ENV) {
            config.echo_sql = parse_bool(ECHO_SQL_ENV, &value)?;
        }
        if let Some(value) = optional_env(BUSY_TIMEOUT_MS_ENV) {
            let millis = value.parse::<u64>().map_err(|_| ConfigError::Invalid {
                name: BUSY_TIMEOUT_MS_ENV.to_string(),
                value: value.clone(),
                expected: "milliseconds as an unsigned integer",
            })?;
            config.busy_timeout = Duration::from_millis(millis);
        }
        if let Some(value) = optional_env(MAX_CONNECTIONS_ENV) {
            config.max_connections = value
                .parse::<u32>()
                .ok()
                .filter(|max| *max > 0)
                .ok_or_else(|| ConfigError::Invalid {
                    name: MAX_CONNECTIONS_ENV.to_string(),
                    value: value.clone(),
                    expected: "a positive integer",
                })?;
        }

        Ok(config)
    }

    pub fn with_echo_sql(mut self, echo_sql: bool) -> Self {
        self.echo_sql = echo_sql;
        self
    }
}

fn parse_bool(name: &str, value: &str) -> ConfigResult<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            name: name.to_string(),
            value: value.to_string(),
            expected: "1|true|yes|on|0|false|no|off",
        }),
    }
}

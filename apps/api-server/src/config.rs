//! Centralized configuration for api-server.
//!
//! All environment variables are loaded and validated at startup to fail fast
//! on misconfiguration rather than at request time. PostgreSQL connection
//! variables (`DB_HOST`, `DB_USER`, ...) are read by the postgres adapter
//! itself when that backend is selected.

use axum::http::HeaderValue;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Default SQLite file location.
pub const DEFAULT_DB_PATH: &str = "./data/expenses.db";
/// Default log group attached to every log sink event.
pub const DEFAULT_LOG_GROUP: &str = "expense-tracker";

/// Storage backend provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageProvider {
    /// In-memory storage (data lost on restart)
    Memory,
    /// SQLite file-based storage
    Sqlite,
    /// PostgreSQL server
    Postgres,
}

impl StorageProvider {
    fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Some(Self::Memory),
            "sqlite" => Some(Self::Sqlite),
            "postgres" | "postgresql" => Some(Self::Postgres),
            _ => None,
        }
    }
}

impl fmt::Display for StorageProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Memory => "memory",
            Self::Sqlite => "sqlite",
            Self::Postgres => "postgres",
        })
    }
}

/// Log output format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    fn from_str(s: &str) -> Self {
        if s.eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Pretty
        }
    }
}

/// Configuration error.
#[derive(Debug)]
pub struct ConfigError {
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Configuration error for {}: {}", self.field, self.message)
    }
}

impl std::error::Error for ConfigError {}

/// Server configuration loaded from environment variables.
///
/// All fields are validated at construction time.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port (default: 8080)
    pub port: u16,
    /// CORS allow origin
    pub cors_allow_origin: HeaderValue,
    /// Storage provider (default: sqlite)
    pub storage_provider: StorageProvider,
    /// SQLite database path (when using sqlite storage)
    pub db_path: PathBuf,
    /// Upper bound for one request's store work
    pub request_timeout: Duration,
    /// Log format
    pub log_format: LogFormat,
    /// Group name attached to log sink events
    pub log_group: String,
}

impl Config {
    /// Load and validate configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`Config::from_env`] with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Port
        let port = match lookup("PORT") {
            Some(raw) => raw.trim().parse::<u16>().map_err(|e| ConfigError {
                field: "PORT",
                message: format!("Invalid port '{raw}': {e}"),
            })?,
            None => 8080,
        };

        // CORS allow origin
        let cors_origin_str = lookup("CORS_ALLOW_ORIGIN").unwrap_or_else(|| "*".into());
        let cors_allow_origin = if cors_origin_str == "*" {
            HeaderValue::from_static("*")
        } else {
            HeaderValue::from_str(&cors_origin_str).map_err(|e| ConfigError {
                field: "CORS_ALLOW_ORIGIN",
                message: format!("Invalid header value '{}': {}", cors_origin_str, e),
            })?
        };

        // Storage provider
        let provider_str = lookup("STORAGE_PROVIDER").unwrap_or_else(|| "sqlite".into());
        let storage_provider =
            StorageProvider::from_str(&provider_str).ok_or_else(|| ConfigError {
                field: "STORAGE_PROVIDER",
                message: format!("Unknown provider '{provider_str}' (memory, sqlite, postgres)"),
            })?;

        // DB path (for sqlite)
        let db_path = lookup("DB_PATH")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH));

        // Request timeout
        let request_timeout = match lookup("REQUEST_TIMEOUT_SECS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .ok_or_else(|| ConfigError {
                    field: "REQUEST_TIMEOUT_SECS",
                    message: format!("Expected a positive number of seconds, got '{raw}'"),
                })?,
            None => Duration::from_secs(10),
        };

        // Log format
        let log_format =
            LogFormat::from_str(&lookup("LOG_FORMAT").unwrap_or_else(|| "pretty".into()));

        let log_group = lookup("LOG_GROUP")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LOG_GROUP.into());

        Ok(Self {
            port,
            cors_allow_origin,
            storage_provider,
            db_path,
            request_timeout,
            log_format,
            log_group,
        })
    }

    /// Log warnings about configurations that lose data or expose the API.
    pub fn warn_if_insecure(&self) {
        if self.storage_provider == StorageProvider::Memory {
            tracing::warn!(
                "STORAGE_PROVIDER=memory: records are kept in process memory and \
                 are lost on restart. DO NOT USE IN PRODUCTION."
            );
        }
        if self.cors_allow_origin == HeaderValue::from_static("*") {
            tracing::warn!(
                "CORS_ALLOW_ORIGIN not set: any origin may call the API. \
                 Set CORS_ALLOW_ORIGIN to restrict browser access."
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<&str, &str> = pairs.iter().copied().collect();
        Config::from_lookup(|key| map.get(key).map(|v| v.to_string()))
    }

    #[test]
    fn defaults() {
        let cfg = config_from(&[]).unwrap();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.storage_provider, StorageProvider::Sqlite);
        assert_eq!(cfg.db_path, PathBuf::from(DEFAULT_DB_PATH));
        assert_eq!(cfg.request_timeout, Duration::from_secs(10));
        assert_eq!(cfg.log_format, LogFormat::Pretty);
        assert_eq!(cfg.log_group, DEFAULT_LOG_GROUP);
        assert_eq!(cfg.cors_allow_origin, HeaderValue::from_static("*"));
    }

    #[test]
    fn storage_provider_parsing() {
        assert_eq!(StorageProvider::from_str("memory"), Some(StorageProvider::Memory));
        assert_eq!(StorageProvider::from_str("SQLITE"), Some(StorageProvider::Sqlite));
        assert_eq!(StorageProvider::from_str("postgres"), Some(StorageProvider::Postgres));
        assert_eq!(StorageProvider::from_str("anything"), None);
    }

    #[test]
    fn log_format_parsing() {
        assert_eq!(LogFormat::from_str("pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::from_str("JSON"), LogFormat::Json);
        assert_eq!(LogFormat::from_str("anything"), LogFormat::Pretty);
    }

    #[test]
    fn explicit_values() {
        let cfg = config_from(&[
            ("PORT", "9090"),
            ("STORAGE_PROVIDER", "memory"),
            ("DB_PATH", "/tmp/x.db"),
            ("REQUEST_TIMEOUT_SECS", "3"),
            ("LOG_FORMAT", "json"),
            ("LOG_GROUP", "/aws/demo"),
            ("CORS_ALLOW_ORIGIN", "https://app.example.com"),
        ])
        .unwrap();
        assert_eq!(cfg.port, 9090);
        assert_eq!(cfg.storage_provider, StorageProvider::Memory);
        assert_eq!(cfg.db_path, PathBuf::from("/tmp/x.db"));
        assert_eq!(cfg.request_timeout, Duration::from_secs(3));
        assert_eq!(cfg.log_format, LogFormat::Json);
        assert_eq!(cfg.log_group, "/aws/demo");
    }

    #[test]
    fn invalid_values_name_the_field() {
        let err = config_from(&[("PORT", "eighty")]).unwrap_err();
        assert_eq!(err.field, "PORT");

        let err = config_from(&[("STORAGE_PROVIDER", "redis")]).unwrap_err();
        assert_eq!(err.field, "STORAGE_PROVIDER");

        let err = config_from(&[("REQUEST_TIMEOUT_SECS", "0")]).unwrap_err();
        assert_eq!(err.field, "REQUEST_TIMEOUT_SECS");

        let err = config_from(&[("CORS_ALLOW_ORIGIN", "bad\norigin")]).unwrap_err();
        assert_eq!(err.field, "CORS_ALLOW_ORIGIN");
    }
}

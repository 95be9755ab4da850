//! Configuration for the record store.
//!
//! Loads configuration from `GAVEL_*` environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::record::DEFAULT_LOOKUP_LIMIT;

/// Storage backend kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    #[default]
    Sqlite,
    SqliteEncrypted,
    Postgres,
    MySql,
}

impl BackendKind {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "sqlite" | "local" => Some(Self::Sqlite),
            "sqlite-encrypted" | "encrypted" => Some(Self::SqliteEncrypted),
            "postgres" | "postgresql" => Some(Self::Postgres),
            "mysql" | "mariadb" => Some(Self::MySql),
            _ => None,
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Postgres | Self::MySql)
    }

    fn default_port(&self) -> u16 {
        match self {
            Self::MySql => 3306,
            _ => 5432,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown database backend `{0}`")]
    UnknownBackend(String),

    #[error("{key} must be {expected}, got `{value}`")]
    Invalid {
        key: &'static str,
        expected: &'static str,
        value: String,
    },

    #[error("{0} must be set for this backend")]
    Missing(&'static str),

    #[error("encrypted storage needs the `sqlcipher` feature")]
    EncryptionUnavailable,
}

/// Connection settings for the configured backend.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub backend: BackendKind,

    /// Embedded database file; `:memory:` opens a private in-memory database.
    pub path: PathBuf,

    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Option<String>,
    pub name: String,
    pub pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Sqlite,
            path: PathBuf::from("gavel.db"),
            host: "localhost".to_string(),
            port: BackendKind::Sqlite.default_port(),
            user: "gavel".to_string(),
            password: None,
            name: "gavel".to_string(),
            pool_size: 10,
        }
    }
}

impl DatabaseConfig {
    /// A private in-memory SQLite database.
    pub fn in_memory() -> Self {
        Self {
            path: PathBuf::from(":memory:"),
            ..Default::default()
        }
    }
}

/// Record cache settings.
#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// When false every read goes straight to the database.
    pub enabled: bool,
    pub capacity: u64,
    pub ttl: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: 10_000,
            ttl: Duration::from_secs(600),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub cache: CacheSettings,

    /// Bound applied to lookups without explicit options.
    pub lookup_limit: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            cache: CacheSettings::default(),
            lookup_limit: DEFAULT_LOOKUP_LIMIT,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let backend = match var("GAVEL_DB_BACKEND") {
            Some(raw) => BackendKind::from_str(&raw).ok_or(ConfigError::UnknownBackend(raw))?,
            None => BackendKind::default(),
        };

        let password = var("GAVEL_DB_PASSWORD");
        if backend == BackendKind::SqliteEncrypted {
            if password.is_none() {
                return Err(ConfigError::Missing("GAVEL_DB_PASSWORD"));
            }
            if !cfg!(feature = "sqlcipher") {
                return Err(ConfigError::EncryptionUnavailable);
            }
        }

        let defaults = DatabaseConfig::default();
        let database = DatabaseConfig {
            backend,
            path: var("GAVEL_DB_PATH").map_or(defaults.path, PathBuf::from),
            host: var("GAVEL_DB_HOST").unwrap_or(defaults.host),
            port: parse(var("GAVEL_DB_PORT"), "GAVEL_DB_PORT", "a port number")?
                .unwrap_or_else(|| backend.default_port()),
            user: var("GAVEL_DB_USER").unwrap_or(defaults.user),
            password,
            name: var("GAVEL_DB_NAME").unwrap_or(defaults.name),
            pool_size: parse(var("GAVEL_DB_POOL_SIZE"), "GAVEL_DB_POOL_SIZE", "a positive integer")?
                .filter(|size| *size > 0)
                .unwrap_or(defaults.pool_size),
        };

        let cache_defaults = CacheSettings::default();
        let cache = CacheSettings {
            enabled: parse_bool(var("GAVEL_CACHE_ENABLED"), "GAVEL_CACHE_ENABLED")?
                .unwrap_or(cache_defaults.enabled),
            capacity: parse(var("GAVEL_CACHE_CAPACITY"), "GAVEL_CACHE_CAPACITY", "an integer")?
                .unwrap_or(cache_defaults.capacity),
            ttl: parse(var("GAVEL_CACHE_TTL_SECS"), "GAVEL_CACHE_TTL_SECS", "a number of seconds")?
                .map_or(cache_defaults.ttl, Duration::from_secs),
        };

        let lookup_limit = parse(var("GAVEL_LOOKUP_LIMIT"), "GAVEL_LOOKUP_LIMIT", "an integer")?
            .unwrap_or(DEFAULT_LOOKUP_LIMIT);

        Ok(Self {
            database,
            cache,
            lookup_limit,
        })
    }
}

fn parse<T: std::str::FromStr>(
    value: Option<String>,
    key: &'static str,
    expected: &'static str,
) -> Result<Option<T>, ConfigError> {
    value
        .map(|raw| {
            raw.trim().parse().map_err(|_| ConfigError::Invalid {
                key,
                expected,
                value: raw,
            })
        })
        .transpose()
}

fn parse_bool(value: Option<String>, key: &'static str) -> Result<Option<bool>, ConfigError> {
    value
        .map(|raw| match raw.trim().to_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(true),
            "false" | "no" | "off" | "0" => Ok(false),
            _ => Err(ConfigError::Invalid {
                key,
                expected: "a boolean",
                value: raw,
            }),
        })
        .transpose()
}

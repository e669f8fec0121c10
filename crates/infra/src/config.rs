//! Process configuration, read from the environment.

use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("DATABASE_URL must be set when USE_PERSISTENT_STORES=true")]
    MissingDatabaseUrl,
}

/// Runtime settings for the service.
///
/// | variable | default |
/// |---|---|
/// | `BIND_ADDR` | `0.0.0.0:8080` |
/// | `DATABASE_URL` | unset (in-memory store) |
/// | `USE_PERSISTENT_STORES` | `true` if `DATABASE_URL` is set |
/// | `STORE_TIMEOUT_SECS` | 5 |
/// | `QUERY_TIMEOUT_SECS` | 15 |
/// | `GATEWAY_TIMEOUT_SECS` | 10 |
/// | `DECODE_TIMEOUT_SECS` | 10 |
/// | `DB_MAX_CONNECTIONS` | 5 |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub bind_addr: String,
    pub database_url: Option<String>,
    pub use_persistent_stores: bool,
    /// Deadline for the existing-id fetch and the transactional write.
    pub store_timeout: Duration,
    /// Deadline for filtered catalog reads.
    pub query_timeout: Duration,
    /// Deadline for downloading a seller's table.
    pub gateway_timeout: Duration,
    /// Deadline for decoding a downloaded table.
    pub decode_timeout: Duration,
    pub db_max_connections: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            database_url: None,
            use_persistent_stores: false,
            store_timeout: Duration::from_secs(5),
            query_timeout: Duration::from_secs(15),
            gateway_timeout: Duration::from_secs(10),
            decode_timeout: Duration::from_secs(10),
            db_max_connections: 5,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key/value source (the environment in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let database_url = lookup("DATABASE_URL").filter(|v| !v.trim().is_empty());
        let use_persistent_stores =
            parse_or("USE_PERSISTENT_STORES", &lookup, database_url.is_some());

        if use_persistent_stores && database_url.is_none() {
            return Err(ConfigError::MissingDatabaseUrl);
        }

        Ok(Self {
            bind_addr: lookup("BIND_ADDR").unwrap_or(defaults.bind_addr),
            database_url,
            use_persistent_stores,
            store_timeout: secs_or("STORE_TIMEOUT_SECS", &lookup, defaults.store_timeout),
            query_timeout: secs_or("QUERY_TIMEOUT_SECS", &lookup, defaults.query_timeout),
            gateway_timeout: secs_or("GATEWAY_TIMEOUT_SECS", &lookup, defaults.gateway_timeout),
            decode_timeout: secs_or("DECODE_TIMEOUT_SECS", &lookup, defaults.decode_timeout),
            db_max_connections: parse_or("DB_MAX_CONNECTIONS", &lookup, defaults.db_max_connections),
        })
    }
}

fn parse_or<T: FromStr + Copy>(key: &str, lookup: &impl Fn(&str) -> Option<String>, default: T) -> T {
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, "invalid config value; using default");
            default
        }),
    }
}

fn secs_or(key: &str, lookup: &impl Fn(&str) -> Option<String>, default: Duration) -> Duration {
    Duration::from_secs(parse_or(key, lookup, default.as_secs()))
}

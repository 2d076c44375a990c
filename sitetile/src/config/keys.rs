//! Addressable configuration keys (`section.key`).

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use super::file::{parse_bool, ConfigFile};
use super::size::{format_size, parse_size};
use super::ConfigError;

/// A single setting of [`ConfigFile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    DatabaseUrl,
    DatabasePoolSize,
    DatabaseConnectTimeoutMs,
    DatabaseStatementTimeoutMs,
    CacheProvider,
    CacheRedisUrl,
    CacheRedisPoolSize,
    CacheMemorySize,
    CacheTtlHours,
    CacheNamespace,
    TilesExtent,
    TilesBuffer,
    TilesCoalesce,
    LoggingLevel,
    LoggingDirectory,
    ServerBind,
}

impl ConfigKey {
    /// Every key, in file order.
    pub fn all() -> &'static [ConfigKey] {
        use ConfigKey::*;
        &[
            DatabaseUrl,
            DatabasePoolSize,
            DatabaseConnectTimeoutMs,
            DatabaseStatementTimeoutMs,
            CacheProvider,
            CacheRedisUrl,
            CacheRedisPoolSize,
            CacheMemorySize,
            CacheTtlHours,
            CacheNamespace,
            TilesExtent,
            TilesBuffer,
            TilesCoalesce,
            LoggingLevel,
            LoggingDirectory,
            ServerBind,
        ]
    }

    pub fn section(&self) -> &'static str {
        use ConfigKey::*;
        match self {
            DatabaseUrl | DatabasePoolSize | DatabaseConnectTimeoutMs
            | DatabaseStatementTimeoutMs => "database",
            CacheProvider | CacheRedisUrl | CacheRedisPoolSize | CacheMemorySize
            | CacheTtlHours | CacheNamespace => "cache",
            TilesExtent | TilesBuffer | TilesCoalesce => "tiles",
            LoggingLevel | LoggingDirectory => "logging",
            ServerBind => "server",
        }
    }

    pub fn key_name(&self) -> &'static str {
        use ConfigKey::*;
        match self {
            DatabaseUrl => "url",
            DatabasePoolSize => "pool_size",
            DatabaseConnectTimeoutMs => "connect_timeout_ms",
            DatabaseStatementTimeoutMs => "statement_timeout_ms",
            CacheProvider => "provider",
            CacheRedisUrl => "redis_url",
            CacheRedisPoolSize => "redis_pool_size",
            CacheMemorySize => "memory_size",
            CacheTtlHours => "ttl_hours",
            CacheNamespace => "namespace",
            TilesExtent => "extent",
            TilesBuffer => "buffer",
            TilesCoalesce => "coalesce",
            LoggingLevel => "level",
            LoggingDirectory => "directory",
            ServerBind => "bind",
        }
    }

    /// Full dotted name, e.g. `cache.ttl_hours`.
    pub fn name(&self) -> String {
        format!("{}.{}", self.section(), self.key_name())
    }

    /// Whether the value should be masked when displayed.
    pub fn is_secret(&self) -> bool {
        matches!(self, ConfigKey::DatabaseUrl | ConfigKey::CacheRedisUrl)
    }

    /// Current value as text; empty when unset.
    pub fn get(&self, config: &ConfigFile) -> String {
        use ConfigKey::*;
        match self {
            DatabaseUrl => config.database.url.clone().unwrap_or_default(),
            DatabasePoolSize => config.database.pool_size.to_string(),
            DatabaseConnectTimeoutMs => config.database.connect_timeout_ms.to_string(),
            DatabaseStatementTimeoutMs => config.database.statement_timeout_ms.to_string(),
            CacheProvider => config.cache.provider.to_string(),
            CacheRedisUrl => config.cache.redis_url.clone().unwrap_or_default(),
            CacheRedisPoolSize => config.cache.redis_pool_size.to_string(),
            CacheMemorySize => format_size(config.cache.memory_size),
            CacheTtlHours => config.cache.ttl_hours.to_string(),
            CacheNamespace => config.cache.namespace.clone(),
            TilesExtent => config.tiles.extent.to_string(),
            TilesBuffer => config.tiles.buffer.to_string(),
            TilesCoalesce => config.tiles.coalesce.to_string(),
            LoggingLevel => config.logging.level.clone(),
            LoggingDirectory => config
                .logging
                .directory
                .as_ref()
                .map(|d| d.display().to_string())
                .unwrap_or_default(),
            ServerBind => config.server.bind.clone(),
        }
    }

    /// Set a value from text. An empty value clears optional settings.
    pub fn set(&self, config: &mut ConfigFile, value: &str) -> Result<(), ConfigError> {
        use ConfigKey::*;
        let value = value.trim();
        let optional = |v: &str| (!v.is_empty()).then(|| v.to_string());

        match self {
            DatabaseUrl => config.database.url = optional(value),
            DatabasePoolSize => config.database.pool_size = self.parse(value)?,
            DatabaseConnectTimeoutMs => config.database.connect_timeout_ms = self.parse(value)?,
            DatabaseStatementTimeoutMs => {
                config.database.statement_timeout_ms = self.parse(value)?
            }
            CacheProvider => {
                config.cache.provider = value
                    .parse()
                    .map_err(|e: String| self.invalid(value, e))?
            }
            CacheRedisUrl => config.cache.redis_url = optional(value),
            CacheRedisPoolSize => config.cache.redis_pool_size = self.parse(value)?,
            CacheMemorySize => config.cache.memory_size = parse_size(value)?,
            CacheTtlHours => config.cache.ttl_hours = self.parse(value)?,
            CacheNamespace => {
                if value.is_empty() {
                    return Err(self.invalid(value, "must not be empty"));
                }
                config.cache.namespace = value.to_string()
            }
            TilesExtent => config.tiles.extent = self.parse(value)?,
            TilesBuffer => config.tiles.buffer = self.parse(value)?,
            TilesCoalesce => {
                config.tiles.coalesce =
                    parse_bool(value).ok_or_else(|| self.invalid(value, "expected true or false"))?
            }
            LoggingLevel => config.logging.level = value.to_string(),
            LoggingDirectory => config.logging.directory = optional(value).map(PathBuf::from),
            ServerBind => config.server.bind = value.to_string(),
        }
        Ok(())
    }

    fn parse<T>(&self, value: &str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        value
            .parse()
            .map_err(|e: T::Err| self.invalid(value, e.to_string()))
    }

    fn invalid(&self, value: &str, reason: impl Into<String>) -> ConfigError {
        ConfigError::invalid(self.section(), self.key_name(), value, reason)
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.section(), self.key_name())
    }
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        ConfigKey::all()
            .iter()
            .copied()
            .find(|k| k.name() == wanted)
            .ok_or_else(|| ConfigError::UnknownKey(s.to_string()))
    }
}

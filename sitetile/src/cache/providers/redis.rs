//! Redis cache provider.
//!
//! Shares tiles between service instances. Connections come from a
//! `deadpool-redis` pool; every value is written with `SET EX` so Redis
//! expires it on its own.

use std::time::Duration;

use deadpool_redis::{Config, Pool, PoolConfig, Runtime};
use redis::{AsyncCommands, RedisError};
use tracing::{debug, info};

use crate::cache::traits::{BoxFuture, Cache, ServiceCacheError};

/// Connection settings for the Redis provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisSettings {
    /// Redis URL (`redis://host:6379/0`).
    pub url: String,
    /// Maximum pooled connections.
    pub pool_size: usize,
    /// Timeout for waiting on, creating and recycling connections.
    pub timeout: Duration,
}

impl RedisSettings {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            pool_size: 16,
            timeout: Duration::from_millis(2000),
        }
    }
}

/// Cache provider backed by a Redis server.
pub struct RedisCacheProvider {
    pool: Pool,
}

impl RedisCacheProvider {
    /// Build the connection pool.
    ///
    /// No connection is opened here; an unreachable server surfaces as
    /// [`ServiceCacheError::Unavailable`] on first use.
    pub fn new(settings: &RedisSettings) -> Result<Self, ServiceCacheError> {
        let mut config = Config::from_url(&settings.url);
        let mut pool_config = PoolConfig::new(settings.pool_size.max(1));
        pool_config.timeouts.wait = Some(settings.timeout);
        pool_config.timeouts.create = Some(settings.timeout);
        pool_config.timeouts.recycle = Some(settings.timeout);
        config.pool = Some(pool_config);

        let pool = config
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| ServiceCacheError::Provider(format!("invalid redis config: {}", e)))?;

        info!(pool_size = settings.pool_size, "Created Redis cache pool");
        Ok(Self { pool })
    }

    /// Check that a connection can be obtained.
    pub async fn ping(&self) -> Result<(), ServiceCacheError> {
        let mut conn = self.connection().await?;
        let _: () = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)?;
        Ok(())
    }

    /// Stop handing out connections.
    pub fn close(&self) {
        self.pool.close();
        debug!("Redis cache pool closed");
    }

    async fn connection(&self) -> Result<deadpool_redis::Connection, ServiceCacheError> {
        self.pool
            .get()
            .await
            .map_err(|e| ServiceCacheError::Unavailable(e.to_string()))
    }
}

fn map_redis_error(e: RedisError) -> ServiceCacheError {
    if e.is_io_error() || e.is_connection_refusal() || e.is_connection_dropped() || e.is_timeout()
    {
        ServiceCacheError::Unavailable(e.to_string())
    } else {
        ServiceCacheError::Provider(e.to_string())
    }
}

impl Cache for RedisCacheProvider {
    fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> BoxFuture<'_, Result<(), ServiceCacheError>> {
        let key = key.to_string();
        Box::pin(async move {
            let mut conn = self.connection().await?;
            // SET EX rejects zero
            let ttl_secs = ttl.as_secs().max(1);
            conn.set_ex::<_, _, ()>(&key, value, ttl_secs)
                .await
                .map_err(map_redis_error)
        })
    }

    fn get(&self, key: &str) -> BoxFuture<'_, Result<Option<Vec<u8>>, ServiceCacheError>> {
        let key = key.to_string();
        Box::pin(async move {
            let mut conn = self.connection().await?;
            conn.get::<_, Option<Vec<u8>>>(&key)
                .await
                .map_err(map_redis_error)
        })
    }

    fn delete(&self, key: &str) -> BoxFuture<'_, Result<bool, ServiceCacheError>> {
        let key = key.to_string();
        Box::pin(async move {
            let mut conn = self.connection().await?;
            let removed: i64 = conn.del(&key).await.map_err(map_redis_error)?;
            Ok(removed > 0)
        })
    }

    fn contains(&self, key: &str) -> BoxFuture<'_, Result<bool, ServiceCacheError>> {
        let key = key.to_string();
        Box::pin(async move {
            let mut conn = self.connection().await?;
            conn.exists::<_, bool>(&key).await.map_err(map_redis_error)
        })
    }

    fn provider_name(&self) -> &'static str {
        "redis"
    }
}

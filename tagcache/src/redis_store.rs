//! Redis store implementation.

use crate::config::{CacheBackend, CacheConfig};
use crate::error::{CacheError, CacheResult};
use crate::store::Store;
use async_trait::async_trait;
use redis::{AsyncCommands, Client, SetExpiry, SetOptions, aio::ConnectionManager};
use std::time::Duration;
use tracing::warn;

/// Redis store.
///
/// Unlike the memcached and in-memory stores, Redis creates a missing counter at zero on the first
/// increment or decrement instead of reporting a miss.
#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
    config: CacheConfig,
    prefix: String,
}

impl RedisStore {
    /// Create a new Redis store from the first server in `config`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use tagcache::*;
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), CacheError> {
    ///     let config = CacheConfig::redis("redis://localhost:6379");
    ///     let store = RedisStore::new(config).await?;
    ///     Ok(())
    /// }
    /// ```
    pub async fn new(config: CacheConfig) -> CacheResult<Self> {
        config.require_backend(CacheBackend::Redis)?;
        config.validate()?;

        let url = config
            .servers
            .first()
            .ok_or_else(|| CacheError::Config("redis backend requires a URL".to_string()))?;
        let client =
            Client::open(url.as_str()).map_err(|e| CacheError::InvalidUrl(e.to_string()))?;

        let connection = tokio::time::timeout(
            config.connection_timeout,
            ConnectionManager::new(client),
        )
        .await
        .map_err(|_| CacheError::Timeout)?
        .map_err(|e| CacheError::Connection(e.to_string()))?;

        let prefix = config.prefix();
        Ok(Self {
            connection,
            config,
            prefix,
        })
    }

    /// Get the underlying connection manager.
    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    /// Build the full key with prefix.
    fn build_key(&self, key: &str) -> String {
        self.config.build_key(key)
    }

    fn map_error(key: &str, err: redis::RedisError) -> CacheError {
        warn!(key, error = %err, "redis operation failed");
        if err.is_timeout() {
            CacheError::Timeout
        } else if err.is_io_error() || err.is_connection_dropped() {
            CacheError::Connection(err.to_string())
        } else {
            CacheError::Backend(err.to_string())
        }
    }

    fn options(ttl: Option<Duration>) -> SetOptions {
        match ttl {
            Some(ttl) if !ttl.is_zero() => {
                SetOptions::default().with_expiration(SetExpiry::PX(duration_millis(ttl)))
            }
            _ => SetOptions::default(),
        }
    }
}

fn duration_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

/// A counter reply as `u64`. A negative stored counter was not written by
/// this store and is reported rather than read as zero.
fn counter_value(key: &str, value: i64) -> CacheResult<u64> {
    u64::try_from(value)
        .map_err(|_| CacheError::Backend(format!("counter at {} is negative: {}", key, value)))
}

fn signed_delta(delta: u64) -> CacheResult<i64> {
    i64::try_from(delta)
        .map_err(|_| CacheError::InvalidInput(format!("counter delta too large: {}", delta)))
}

#[async_trait]
impl Store for RedisStore {
    async fn get(&self, key: &str) -> CacheResult<Vec<u8>> {
        let full_key = self.build_key(key);
        let mut conn = self.connection.clone();

        let value: Option<Vec<u8>> = conn
            .get(&full_key)
            .await
            .map_err(|e| Self::map_error(key, e))?;
        value.ok_or_else(|| CacheError::miss(key))
    }

    async fn put(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> CacheResult<()> {
        let full_key = self.build_key(key);
        let mut conn = self.connection.clone();
        let options = Self::options(ttl.or(self.config.default_ttl));

        let _: () = conn
            .set_options(&full_key, value, options)
            .await
            .map_err(|e| Self::map_error(key, e))?;
        Ok(())
    }

    async fn forever(&self, key: &str, value: Vec<u8>) -> CacheResult<()> {
        let full_key = self.build_key(key);
        let mut conn = self.connection.clone();

        let _: () = conn
            .set(&full_key, value)
            .await
            .map_err(|e| Self::map_error(key, e))?;
        Ok(())
    }

    async fn add(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> CacheResult<bool> {
        let full_key = self.build_key(key);
        let mut conn = self.connection.clone();
        let options = Self::options(ttl.or(self.config.default_ttl))
            .conditional_set(redis::ExistenceCheck::NX);

        let stored: Option<String> = conn
            .set_options(&full_key, value, options)
            .await
            .map_err(|e| Self::map_error(key, e))?;
        Ok(stored.is_some())
    }

    async fn increment(&self, key: &str, delta: u64) -> CacheResult<u64> {
        let full_key = self.build_key(key);
        let mut conn = self.connection.clone();

        let new_value: i64 = conn
            .incr(&full_key, signed_delta(delta)?)
            .await
            .map_err(|e| Self::map_error(key, e))?;
        counter_value(key, new_value)
    }

    async fn decrement(&self, key: &str, delta: u64) -> CacheResult<u64> {
        let full_key = self.build_key(key);
        let mut conn = self.connection.clone();

        let new_value: i64 = conn
            .decr(&full_key, signed_delta(delta)?)
            .await
            .map_err(|e| Self::map_error(key, e))?;

        if new_value < 0 {
            // Clamp like memcached. Not atomic with the DECRBY above.
            let _: () = conn
                .set(&full_key, 0)
                .await
                .map_err(|e| Self::map_error(key, e))?;
            return Ok(0);
        }

        counter_value(key, new_value)
    }

    async fn forget(&self, key: &str) -> CacheResult<()> {
        let full_key = self.build_key(key);
        let mut conn = self.connection.clone();
        let _: () = conn
            .del(&full_key)
            .await
            .map_err(|e| Self::map_error(key, e))?;
        Ok(())
    }

    async fn flush(&self) -> CacheResult<()> {
        let mut conn = self.connection.clone();
        let _: () = redis::cmd("FLUSHDB")
            .query_async(&mut conn)
            .await
            .map_err(|e| Self::map_error("*", e))?;
        Ok(())
    }

    fn prefix(&self) -> &str {
        &self.prefix
    }
}

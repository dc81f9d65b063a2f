//! Memcached store implementation.

use crate::config::{CacheBackend, CacheConfig};
use crate::error::{CacheError, CacheResult};
use crate::store::Store;
use async_trait::async_trait;
use memcache::{CommandError, MemcacheError};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Longest relative expiration memcached accepts; larger values are read as
/// absolute unix timestamps.
const MAX_RELATIVE_EXPIRATION: u64 = 60 * 60 * 24 * 30;

/// Memcached store.
///
/// The `memcache` client is blocking, so every call runs on the blocking
/// pool. The client pools its own connections and is shared between calls.
#[derive(Clone)]
pub struct MemcachedStore {
    client: Arc<memcache::Client>,
    config: CacheConfig,
    prefix: String,
}

impl MemcachedStore {
    /// Connect to every server in `config`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use tagcache::*;
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), CacheError> {
    ///     let config = CacheConfig::memcached("localhost:11211").with_key_prefix("cn");
    ///     let store = MemcachedStore::new(config).await?;
    ///     let cache = CacheService::new(store);
    ///     Ok(())
    /// }
    /// ```
    pub async fn new(config: CacheConfig) -> CacheResult<Self> {
        config.require_backend(CacheBackend::Memcached)?;
        config.validate()?;

        let urls = config
            .servers
            .iter()
            .map(|server| Self::parse_memcached_url(server))
            .collect::<CacheResult<Vec<_>>>()?;
        let pool_size = config.max_idle_connections;
        let io_timeout = Some(config.operation_timeout);

        let connect = tokio::task::spawn_blocking(move || {
            let client = memcache::Client::with_pool_size(urls, pool_size)?;
            client.set_read_timeout(io_timeout)?;
            client.set_write_timeout(io_timeout)?;
            Ok::<_, MemcacheError>(client)
        });

        let client = tokio::time::timeout(config.connection_timeout, connect)
            .await
            .map_err(|_| CacheError::Timeout)?
            .map_err(|e| CacheError::Connection(format!("Failed to spawn task: {}", e)))?
            .map_err(|e| CacheError::Connection(format!("Failed to connect: {}", e)))?;

        let prefix = config.prefix();
        Ok(Self {
            client: Arc::new(client),
            config,
            prefix,
        })
    }

    /// Parse Memcached URL to extract server address.
    ///
    /// Accepts "memcache://localhost:11211" or plain "localhost:11211".
    fn parse_memcached_url(url: &str) -> CacheResult<String> {
        if url.starts_with("memcache://") {
            Ok(url.to_string())
        } else if url.contains("://") {
            Err(CacheError::InvalidUrl(format!(
                "Invalid Memcached URL: {}. Only the memcache:// scheme is supported",
                url
            )))
        } else if url.contains(':') {
            Ok(format!("memcache://{}", url))
        } else {
            Err(CacheError::InvalidUrl(format!(
                "Invalid Memcached URL: {}. Expected format: 'memcache://host:port' or 'host:port'",
                url
            )))
        }
    }

    /// Build the full key with prefix.
    fn build_key(&self, key: &str) -> String {
        self.config.build_key(key)
    }

    /// Convert a TTL to a memcached expiration field.
    ///
    /// `None` and zero mean "never expire". Anything past thirty days is sent
    /// as an absolute unix timestamp.
    fn expiration(ttl: Option<Duration>) -> u32 {
        let secs = match ttl {
            Some(ttl) if !ttl.is_zero() => ttl.as_secs().max(1),
            _ => return 0,
        };

        let value = if secs > MAX_RELATIVE_EXPIRATION {
            let now = u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0);
            now.saturating_add(secs)
        } else {
            secs
        };

        u32::try_from(value).unwrap_or(u32::MAX)
    }

    async fn run<T, F>(&self, key: &str, op: F) -> CacheResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&memcache::Client) -> Result<T, MemcacheError> + Send + 'static,
    {
        let client = self.client.clone();

        tokio::task::spawn_blocking(move || op(&client))
            .await
            .map_err(|e| CacheError::Backend(format!("Task join error: {}", e)))?
            .map_err(|e| Self::map_error(key, e))
    }

    fn map_error(key: &str, err: MemcacheError) -> CacheError {
        match err {
            MemcacheError::CommandError(CommandError::KeyNotFound) => CacheError::miss(key),
            MemcacheError::IOError(e)
                if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) =>
            {
                warn!(key, "memcached operation timed out");
                CacheError::Timeout
            }
            MemcacheError::IOError(e) => {
                warn!(key, error = %e, "memcached connection error");
                CacheError::Connection(e.to_string())
            }
            other => {
                warn!(key, error = %other, "memcached operation failed");
                CacheError::Backend(other.to_string())
            }
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, expiration: u32) -> CacheResult<()> {
        let full_key = self.build_key(key);
        self.run(key, move |client| {
            client.set(&full_key, value.as_slice(), expiration)
        })
        .await
    }

    /// Apply `update` to an existing counter.
    ///
    /// Binary-protocol INCR/DECR create a missing counter at zero and drop
    /// the delta, so absence is checked with a GET first. A counter that
    /// expires between the two commands is still created at zero.
    async fn update_counter<F>(&self, key: &str, update: F) -> CacheResult<u64>
    where
        F: FnOnce(&memcache::Client, &str) -> Result<u64, MemcacheError> + Send + 'static,
    {
        let full_key = self.build_key(key);
        self.run(key, move |client| {
            if client.get::<Vec<u8>>(&full_key)?.is_none() {
                return Err(MemcacheError::CommandError(CommandError::KeyNotFound));
            }
            update(client, &full_key)
        })
        .await
    }
}

#[async_trait]
impl Store for MemcachedStore {
    async fn get(&self, key: &str) -> CacheResult<Vec<u8>> {
        let full_key = self.build_key(key);
        let value = self
            .run(key, move |client| client.get::<Vec<u8>>(&full_key))
            .await?;

        value.ok_or_else(|| CacheError::miss(key))
    }

    async fn put(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> CacheResult<()> {
        let ttl = ttl.or(self.config.default_ttl);
        self.set(key, value, Self::expiration(ttl)).await
    }

    async fn forever(&self, key: &str, value: Vec<u8>) -> CacheResult<()> {
        self.set(key, value, 0).await
    }

    async fn add(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> CacheResult<bool> {
        let full_key = self.build_key(key);
        let expiration = Self::expiration(ttl.or(self.config.default_ttl));

        let result = self
            .run(key, move |client| {
                match client.add(&full_key, value.as_slice(), expiration) {
                    Ok(()) => Ok(true),
                    Err(MemcacheError::CommandError(CommandError::KeyExists)) => Ok(false),
                    Err(err) => Err(err),
                }
            })
            .await?;

        Ok(result)
    }

    async fn increment(&self, key: &str, delta: u64) -> CacheResult<u64> {
        self.update_counter(key, move |client, full_key| {
            client.increment(full_key, delta)
        })
        .await
    }

    async fn decrement(&self, key: &str, delta: u64) -> CacheResult<u64> {
        self.update_counter(key, move |client, full_key| {
            client.decrement(full_key, delta)
        })
        .await
    }

    async fn forget(&self, key: &str) -> CacheResult<()> {
        let full_key = self.build_key(key);
        self.run(key, move |client| client.delete(&full_key))
            .await?;
        Ok(())
    }

    async fn flush(&self) -> CacheResult<()> {
        self.run("*", |client| client.flush()).await
    }

    fn prefix(&self) -> &str {
        &self.prefix
    }
}

//! Store trait definition.

use crate::error::{CacheResult, miss_to_none};
use async_trait::async_trait;
use futures::future::try_join_all;
use std::time::Duration;

/// Byte storage backend consumed by the cache services.
///
/// Keys arrive fully composed (tag keys or hashed item keys). A store may
/// prepend its own fixed prefix, reported by [`Store::prefix`]. An absent key
/// must be reported as [`CacheError::Miss`](crate::CacheError::Miss), never as
/// `Ok` with an empty value.
#[async_trait]
pub trait Store: Send + Sync {
    /// Get the raw bytes stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Miss`](crate::CacheError::Miss) if the key is
    /// absent or expired, or a backend error if the lookup itself failed.
    async fn get(&self, key: &str) -> CacheResult<Vec<u8>>;

    /// Store a value with an optional time-to-live.
    ///
    /// `None` falls back to the store's configured default TTL. A store
    /// without one keeps the value until the backend evicts it.
    async fn put(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> CacheResult<()>;

    /// Store a value without expiration.
    ///
    /// Stores with a default TTL must override this, since the provided
    /// version goes through [`Store::put`].
    async fn forever(&self, key: &str, value: Vec<u8>) -> CacheResult<()> {
        self.put(key, value, None).await
    }

    /// Store a value only if the key is absent.
    ///
    /// Returns `false` when the key already held a value.
    async fn add(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> CacheResult<bool>;

    /// Atomically increment a decimal counter and return the new value.
    ///
    /// # Errors
    ///
    /// The in-memory and memcached stores return a miss for an absent
    /// counter. Redis creates it at zero instead.
    async fn increment(&self, key: &str, delta: u64) -> CacheResult<u64>;

    /// Atomically decrement a decimal counter and return the new value.
    ///
    /// Counters never go below zero.
    async fn decrement(&self, key: &str, delta: u64) -> CacheResult<u64>;

    /// Delete a single key. Deleting an absent key is not an error.
    async fn forget(&self, key: &str) -> CacheResult<()>;

    /// Remove every entry from the store.
    ///
    /// **Warning:** This affects all keys, tagged or not.
    async fn flush(&self) -> CacheResult<()>;

    /// The colon-terminated prefix this store applies to every key, or `""`.
    fn prefix(&self) -> &str;

    // ========== Batch Operations (Parallel) ==========

    /// Get multiple keys concurrently.
    ///
    /// Returns values in input order; misses become `None`. Any other error
    /// aborts the batch.
    async fn many(&self, keys: &[&str]) -> CacheResult<Vec<Option<Vec<u8>>>> {
        let futures = keys
            .iter()
            .map(|key| async move { miss_to_none(self.get(key).await) });
        try_join_all(futures).await
    }

    /// Store multiple key-value pairs concurrently with a shared TTL.
    async fn put_many(&self, items: &[(&str, Vec<u8>)], ttl: Option<Duration>) -> CacheResult<()> {
        let futures = items
            .iter()
            .map(|(key, value)| self.put(key, value.clone(), ttl));
        try_join_all(futures).await?;
        Ok(())
    }
}

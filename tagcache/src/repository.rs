//! Operations shared by the tagged and untagged cache services.

use crate::error::{CacheError, CacheResult};
use async_trait::async_trait;
use std::time::Duration;

/// The key/value surface common to [`CacheService`](crate::CacheService) and
/// [`TaggedCache`](crate::TaggedCache).
///
/// Implementations differ only in how a caller key becomes a physical key:
/// the untagged service uses it as is, the tagged one prefixes it with the
/// hashed tag namespace.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Get the value under `key`.
    ///
    /// # Errors
    ///
    /// [`CacheError::Miss`] if nothing is reachable under `key`.
    async fn get(&self, key: &str) -> CacheResult<Vec<u8>>;

    /// Get several keys at once; misses become `None`.
    ///
    /// # Errors
    ///
    /// [`CacheError::InvalidInput`] if `keys` is empty.
    async fn many(&self, keys: &[&str]) -> CacheResult<Vec<Option<Vec<u8>>>>;

    /// Store a value with an optional time-to-live.
    async fn put(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> CacheResult<()>;

    /// Store several values with a shared time-to-live.
    async fn put_many(&self, items: &[(&str, Vec<u8>)], ttl: Option<Duration>) -> CacheResult<()>;

    /// Store a value without expiration.
    async fn forever(&self, key: &str, value: Vec<u8>) -> CacheResult<()>;

    /// Store a value only if nothing is reachable under `key`.
    async fn add(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> CacheResult<bool>;

    /// Increment a counter and return its new value.
    async fn increment(&self, key: &str, delta: u64) -> CacheResult<u64>;

    /// Decrement a counter and return its new value.
    async fn decrement(&self, key: &str, delta: u64) -> CacheResult<u64>;

    /// Delete the value under `key`.
    async fn forget(&self, key: &str) -> CacheResult<()>;

    /// Whether a value is reachable under `key`.
    async fn has(&self, key: &str) -> CacheResult<bool> {
        match self.get(key).await {
            Ok(_) => Ok(true),
            Err(err) if err.is_miss() => Ok(false),
            Err(err) => Err(err),
        }
    }
}

/// Reject keys no backend can address.
pub(crate) fn validate_key(key: &str) -> CacheResult<()> {
    if key.is_empty() {
        return Err(CacheError::InvalidInput(
            "cache key must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Reject an empty batch or any empty key within it.
pub(crate) fn validate_keys<'a, I>(keys: I) -> CacheResult<()>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = false;
    for key in keys {
        validate_key(key)?;
        seen = true;
    }

    if !seen {
        return Err(CacheError::InvalidInput("no keys supplied".to_string()));
    }
    Ok(())
}

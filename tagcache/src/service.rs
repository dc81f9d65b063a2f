//! Untagged cache service.

use crate::error::CacheResult;
use crate::repository::{Repository, validate_key, validate_keys};
use crate::store::Store;
use crate::tagged::TaggedCache;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Entry point for cache access.
///
/// Operations on the service itself use the caller's key directly, with no
/// namespace round-trip. [`CacheService::tags`] is the only way to obtain a
/// [`TaggedCache`].
pub struct CacheService<S: Store> {
    store: Arc<S>,
}

impl<S: Store> CacheService<S> {
    /// Create a new cache service that owns `store`.
    pub fn new(store: S) -> Self {
        Self::from_arc(Arc::new(store))
    }

    /// Create a cache service over a shared store.
    pub fn from_arc(store: Arc<S>) -> Self {
        Self { store }
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// A view of this store scoped to `names`.
    ///
    /// # Examples
    ///
    /// ```
    /// use tagcache::{CacheService, InMemoryStore};
    ///
    /// let cache = CacheService::new(InMemoryStore::new());
    /// let tagged = cache.tags(["users", "active-users"]);
    /// assert_eq!(tagged.names(), ["users", "active-users"]);
    /// ```
    pub fn tags<I, T>(&self, names: I) -> TaggedCache<S>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        TaggedCache::new(self.store.clone(), names)
    }

    /// Remove every entry from the store, tagged or not.
    pub async fn flush(&self) -> CacheResult<()> {
        self.store.flush().await
    }
}

#[async_trait]
impl<S: Store> Repository for CacheService<S> {
    async fn get(&self, key: &str) -> CacheResult<Vec<u8>> {
        validate_key(key)?;
        self.store.get(key).await
    }

    async fn many(&self, keys: &[&str]) -> CacheResult<Vec<Option<Vec<u8>>>> {
        validate_keys(keys.iter().copied())?;
        self.store.many(keys).await
    }

    async fn put(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> CacheResult<()> {
        validate_key(key)?;
        self.store.put(key, value, ttl).await
    }

    async fn put_many(&self, items: &[(&str, Vec<u8>)], ttl: Option<Duration>) -> CacheResult<()> {
        validate_keys(items.iter().map(|(key, _)| *key))?;
        self.store.put_many(items, ttl).await
    }

    async fn forever(&self, key: &str, value: Vec<u8>) -> CacheResult<()> {
        validate_key(key)?;
        self.store.forever(key, value).await
    }

    async fn add(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> CacheResult<bool> {
        validate_key(key)?;
        self.store.add(key, value, ttl).await
    }

    async fn increment(&self, key: &str, delta: u64) -> CacheResult<u64> {
        validate_key(key)?;
        self.store.increment(key, delta).await
    }

    async fn decrement(&self, key: &str, delta: u64) -> CacheResult<u64> {
        validate_key(key)?;
        self.store.decrement(key, delta).await
    }

    async fn forget(&self, key: &str) -> CacheResult<()> {
        validate_key(key)?;
        self.store.forget(key).await
    }
}

impl<S: Store> Clone for CacheService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: Store> fmt::Debug for CacheService<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheService")
            .field("prefix", &self.store.prefix())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CacheError;
    use crate::memory::InMemoryStore;

    #[tokio::test]
    async fn test_raw_keys() {
        let cache = CacheService::new(InMemoryStore::new());
        cache.forever("plain", b"v".to_vec()).await.unwrap();

        assert_eq!(cache.store().get("plain").await.unwrap(), b"v");
        assert_eq!(cache.get("plain").await.unwrap(), b"v");
    }

    #[tokio::test]
    async fn test_get_missing_is_miss() {
        let cache = CacheService::new(InMemoryStore::new());
        let err = cache.get("never-stored").await.unwrap_err();
        assert!(err.is_miss());
    }

    #[tokio::test]
    async fn test_counters_use_raw_key() {
        let cache = CacheService::new(InMemoryStore::new());
        cache.forever("hits", b"1".to_vec()).await.unwrap();

        assert_eq!(cache.increment("hits", 9).await.unwrap(), 10);
        assert_eq!(cache.decrement("hits", 4).await.unwrap(), 6);
        assert_eq!(cache.store().get("hits").await.unwrap(), b"6");
    }

    #[tokio::test]
    async fn test_no_keys_is_invalid_input() {
        let cache = CacheService::new(InMemoryStore::new());

        assert!(matches!(
            cache.many(&[]).await,
            Err(CacheError::InvalidInput(_))
        ));
        assert!(matches!(
            cache.get("").await,
            Err(CacheError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_tags_share_store() {
        let cache = CacheService::new(InMemoryStore::new());
        let tagged = cache.tags(["users"]);

        tagged.forever("user:1", b"alice".to_vec()).await.unwrap();

        // The untagged view does not see tagged entries under the raw key.
        assert!(cache.get("user:1").await.unwrap_err().is_miss());
        assert!(cache.store().get("tag:users:key").await.is_ok());
    }

    #[tokio::test]
    async fn test_untagged_unaffected_by_tag_flush() {
        let cache = CacheService::new(InMemoryStore::new());
        cache.forever("config", b"on".to_vec()).await.unwrap();

        cache.tags(["users"]).flush().await.unwrap();

        assert_eq!(cache.get("config").await.unwrap(), b"on");
    }

    #[tokio::test]
    async fn test_flush_store() {
        let cache = CacheService::new(InMemoryStore::new());
        cache.forever("a", b"1".to_vec()).await.unwrap();

        cache.flush().await.unwrap();
        assert!(!cache.has("a").await.unwrap());
    }
}

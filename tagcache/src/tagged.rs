//! Tag-based cache invalidation.
//!
//! Values are stored under a physical key derived from the caller's key and
//! the current identifiers of every tag in the set:
//!
//! ```text
//! hex(sha1("<id of tag 1>|<id of tag 2>|...")) + ":" + key
//! ```
//!
//! Flushing a tag replaces its identifier, so every key derived from the old
//! identifier stops being looked up. Old entries are never deleted; the
//! backend's eviction reclaims them.

use crate::error::CacheResult;
use crate::repository::{Repository, validate_key, validate_keys};
use crate::store::Store;
use crate::tag_set::TagSet;
use async_trait::async_trait;
use sha1::{Digest, Sha1};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, trace};

/// Compose a physical item key from a namespace and a caller key.
///
/// ```
/// let key = tagcache::namespaced_key("5e4e50b381b08354922998", "posts");
/// assert_eq!(key, "bff7bf5e588590a06e98f9109993699721b495f2:posts");
/// ```
pub fn namespaced_key(namespace: &str, key: &str) -> String {
    let digest = Sha1::digest(namespace.as_bytes());
    format!("{}:{}", hex::encode(digest), key)
}

/// A view of a store scoped to a set of tags.
///
/// Every operation first resolves the tag namespace, so each call sees one
/// consistent snapshot of the tag identifiers. Instances are cheap and are
/// meant to be created per request.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use tagcache::{InMemoryStore, Repository, TaggedCache};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> tagcache::CacheResult<()> {
/// let store = Arc::new(InMemoryStore::new());
/// let cache = TaggedCache::new(store, ["adUnits"]);
///
/// cache.forever("site:1", b"payload".to_vec()).await?;
/// assert!(cache.has("site:1").await?);
///
/// cache.flush().await?;
/// assert!(!cache.has("site:1").await?);
/// # Ok(())
/// # }
/// ```
pub struct TaggedCache<S: Store> {
    store: Arc<S>,
    tags: TagSet<S>,
}

impl<S: Store> TaggedCache<S> {
    /// Create a tagged view of `store` over `names`.
    pub fn new<I, T>(store: Arc<S>, names: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let tags = TagSet::new(store.clone(), names);
        Self { store, tags }
    }

    /// The tag set backing this view.
    pub fn tag_set(&self) -> &TagSet<S> {
        &self.tags
    }

    /// Tag names in namespace order.
    pub fn names(&self) -> &[String] {
        self.tags.names()
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Physical key for `key` under the current tag identifiers.
    pub async fn item_key(&self, key: &str) -> CacheResult<String> {
        let namespace = self.tags.namespace().await?;
        let item_key = namespaced_key(&namespace, key);
        trace!(key, item_key = %item_key, "tagged item key");
        Ok(item_key)
    }

    /// Invalidate everything cached under any tag of this set.
    ///
    /// # Errors
    ///
    /// Returns the first store error; tags reset before it stay reset.
    pub async fn flush(&self) -> CacheResult<()> {
        self.tags.invalidate_all().await?;
        info!(tags = ?self.tags.names(), "tags flushed");
        Ok(())
    }

    /// A new view over the same store with a different tag list.
    pub fn tags<I, T>(&self, names: I) -> TaggedCache<S>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        TaggedCache::new(self.store.clone(), names)
    }

    async fn item_keys<'a, I>(&self, keys: I) -> CacheResult<Vec<String>>
    where
        I: IntoIterator<Item = &'a str> + Send,
        I::IntoIter: Send,
    {
        let namespace = self.tags.namespace().await?;
        Ok(keys
            .into_iter()
            .map(|key| namespaced_key(&namespace, key))
            .collect())
    }
}

#[async_trait]
impl<S: Store> Repository for TaggedCache<S> {
    async fn get(&self, key: &str) -> CacheResult<Vec<u8>> {
        validate_key(key)?;
        let item_key = self.item_key(key).await?;
        self.store.get(&item_key).await
    }

    async fn many(&self, keys: &[&str]) -> CacheResult<Vec<Option<Vec<u8>>>> {
        validate_keys(keys.iter().copied())?;
        let item_keys = self.item_keys(keys.iter().copied()).await?;
        let refs: Vec<&str> = item_keys.iter().map(String::as_str).collect();
        self.store.many(&refs).await
    }

    async fn put(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> CacheResult<()> {
        validate_key(key)?;
        let item_key = self.item_key(key).await?;
        self.store.put(&item_key, value, ttl).await
    }

    async fn put_many(&self, items: &[(&str, Vec<u8>)], ttl: Option<Duration>) -> CacheResult<()> {
        validate_keys(items.iter().map(|(key, _)| *key))?;
        let item_keys = self.item_keys(items.iter().map(|(key, _)| *key)).await?;
        let namespaced: Vec<(&str, Vec<u8>)> = item_keys
            .iter()
            .zip(items)
            .map(|(item_key, (_, value))| (item_key.as_str(), value.clone()))
            .collect();
        self.store.put_many(&namespaced, ttl).await
    }

    async fn forever(&self, key: &str, value: Vec<u8>) -> CacheResult<()> {
        validate_key(key)?;
        let item_key = self.item_key(key).await?;
        self.store.forever(&item_key, value).await
    }

    async fn add(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> CacheResult<bool> {
        validate_key(key)?;
        let item_key = self.item_key(key).await?;
        self.store.add(&item_key, value, ttl).await
    }

    // Counters go through the namespaced key so a flush resets them as well.
    async fn increment(&self, key: &str, delta: u64) -> CacheResult<u64> {
        validate_key(key)?;
        let item_key = self.item_key(key).await?;
        self.store.increment(&item_key, delta).await
    }

    async fn decrement(&self, key: &str, delta: u64) -> CacheResult<u64> {
        validate_key(key)?;
        let item_key = self.item_key(key).await?;
        self.store.decrement(&item_key, delta).await
    }

    async fn forget(&self, key: &str) -> CacheResult<()> {
        validate_key(key)?;
        let item_key = self.item_key(key).await?;
        self.store.forget(&item_key).await
    }
}

impl<S: Store> Clone for TaggedCache<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            tags: self.tags.clone(),
        }
    }
}

impl<S: Store> fmt::Debug for TaggedCache<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaggedCache")
            .field("tags", &self.tags)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CacheError;
    use crate::memory::InMemoryStore;

    const AD_UNITS_ID: &str = "5e4e50b381b08354922998";
    const AD_UNITS_KEY: &str = "goodwin.com/qui-accusamus-saepe-et-laborum-velit-id-vel_ad-units";
    const AD_UNITS_HASHED: &str = "bff7bf5e588590a06e98f9109993699721b495f2:goodwin.com/qui-accusamus-saepe-et-laborum-velit-id-vel_ad-units";

    fn store() -> Arc<InMemoryStore> {
        Arc::new(InMemoryStore::with_prefix("cn"))
    }

    #[test]
    fn test_namespaced_key_of_empty_namespace() {
        assert_eq!(
            namespaced_key("", "k"),
            "da39a3ee5e6b4b0d3255bfef95601890afd80709:k"
        );
    }

    #[tokio::test]
    async fn test_item_key_matches_known_hash() {
        let store = store();
        store
            .forever("tag:adUnits:key", AD_UNITS_ID.as_bytes().to_vec())
            .await
            .unwrap();

        let cache = TaggedCache::new(store, ["adUnits"]);
        assert_eq!(cache.item_key(AD_UNITS_KEY).await.unwrap(), AD_UNITS_HASHED);
    }

    #[tokio::test]
    async fn test_get_reads_hashed_key() {
        let store = store();
        store
            .forever("tag:adUnits:key", AD_UNITS_ID.as_bytes().to_vec())
            .await
            .unwrap();
        store
            .forever(AD_UNITS_HASHED, b"testValue".to_vec())
            .await
            .unwrap();

        let cache = TaggedCache::new(store, ["adUnits"]);
        assert_eq!(cache.get(AD_UNITS_KEY).await.unwrap(), b"testValue");
    }

    #[tokio::test]
    async fn test_get_under_other_identifier_misses() {
        let store = store();
        store
            .forever("tag:adUnits:key", b"5e4e59648ef3e386705450".to_vec())
            .await
            .unwrap();
        store
            .forever(AD_UNITS_HASHED, b"testValue".to_vec())
            .await
            .unwrap();

        let cache = TaggedCache::new(store, ["adUnits"]);
        let err = cache.get(AD_UNITS_KEY).await.unwrap_err();
        assert!(err.is_miss());
    }

    #[tokio::test]
    async fn test_item_key_is_deterministic() {
        let cache = TaggedCache::new(store(), ["a", "b"]);

        let first = cache.item_key("k").await.unwrap();
        let second = cache.item_key("k").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_tag_order_changes_item_key() {
        let store = store();
        let ab = TaggedCache::new(store.clone(), ["a", "b"]);
        let ba = ab.tags(["b", "a"]);

        assert_ne!(
            ab.item_key("k").await.unwrap(),
            ba.item_key("k").await.unwrap()
        );
    }

    #[tokio::test]
    async fn test_flush_invalidates_values() {
        let store = store();
        let cache = TaggedCache::new(store.clone(), ["users"]);

        cache.put("user:1", b"alice".to_vec(), None).await.unwrap();
        let old_key = cache.item_key("user:1").await.unwrap();
        assert_eq!(cache.get("user:1").await.unwrap(), b"alice");

        cache.flush().await.unwrap();

        assert!(cache.get("user:1").await.unwrap_err().is_miss());
        // Still physically present under the old key.
        assert_eq!(store.get(&old_key).await.unwrap(), b"alice");
    }

    #[tokio::test]
    async fn test_flush_resets_counters() {
        let cache = TaggedCache::new(store(), ["stats"]);

        cache.forever("views", b"0".to_vec()).await.unwrap();
        assert_eq!(cache.increment("views", 3).await.unwrap(), 3);
        assert_eq!(cache.decrement("views", 1).await.unwrap(), 2);

        cache.flush().await.unwrap();

        assert!(cache.increment("views", 1).await.unwrap_err().is_miss());
    }

    #[tokio::test]
    async fn test_unrelated_tags_survive_flush() {
        let store = store();
        let users = TaggedCache::new(store.clone(), ["users"]);
        let posts = users.tags(["posts"]);

        users.forever("k", b"u".to_vec()).await.unwrap();
        posts.forever("k", b"p".to_vec()).await.unwrap();

        users.flush().await.unwrap();

        assert!(users.get("k").await.unwrap_err().is_miss());
        assert_eq!(posts.get("k").await.unwrap(), b"p");
    }

    #[tokio::test]
    async fn test_multi_tag_flush_by_any_tag() {
        let store = store();
        let both = TaggedCache::new(store.clone(), ["users", "posts"]);
        both.forever("feed", b"data".to_vec()).await.unwrap();

        TaggedCache::new(store, ["posts"]).flush().await.unwrap();

        assert!(both.get("feed").await.unwrap_err().is_miss());
    }

    #[tokio::test]
    async fn test_many_and_put_many() {
        let cache = TaggedCache::new(store(), ["batch"]);
        cache
            .put_many(&[("a", b"1".to_vec()), ("b", b"2".to_vec())], None)
            .await
            .unwrap();

        let values = cache.many(&["a", "c", "b"]).await.unwrap();
        assert_eq!(values, vec![Some(b"1".to_vec()), None, Some(b"2".to_vec())]);
    }

    #[tokio::test]
    async fn test_add_and_forget() {
        let cache = TaggedCache::new(store(), ["t"]);

        assert!(cache.add("k", b"1".to_vec(), None).await.unwrap());
        assert!(!cache.add("k", b"2".to_vec(), None).await.unwrap());

        cache.forget("k").await.unwrap();
        assert!(!cache.has("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_empty_key_rejected() {
        let cache = TaggedCache::new(store(), ["t"]);

        assert!(matches!(
            cache.get("").await,
            Err(CacheError::InvalidInput(_))
        ));
        assert!(matches!(
            cache.many(&[]).await,
            Err(CacheError::InvalidInput(_))
        ));
    }
}

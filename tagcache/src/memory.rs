//! In-process store backed by a `HashMap`.

use crate::error::{CacheError, CacheResult};
use crate::store::Store;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// In-memory store.
///
/// Clones share the same map. Counters behave like memcached: an absent
/// counter is a miss, increments wrap at `u64::MAX` and decrements stop at
/// zero.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    prefix: String,
    data: Arc<RwLock<HashMap<String, Entry>>>,
}

#[derive(Clone)]
struct Entry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(value: Vec<u8>, ttl: Option<Duration>) -> Self {
        Self {
            value,
            expires_at: ttl.map(|d| Instant::now() + d),
        }
    }

    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|exp| exp > now)
    }
}

impl InMemoryStore {
    /// Create an empty store without a key prefix.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store that applies `"<prefix>:"` to every key.
    ///
    /// ```
    /// use tagcache::{InMemoryStore, Store};
    ///
    /// let store = InMemoryStore::with_prefix("cn");
    /// assert_eq!(store.prefix(), "cn:");
    /// ```
    pub fn with_prefix(prefix: &str) -> Self {
        let prefix = if prefix.is_empty() {
            String::new()
        } else {
            format!("{}:", prefix)
        };

        Self {
            prefix,
            data: Arc::default(),
        }
    }

    /// Number of live (unexpired) entries.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.data
            .read()
            .await
            .values()
            .filter(|entry| entry.is_live(now))
            .count()
    }

    /// Whether the store holds no live entries.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop expired entries and return how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let mut data = self.data.write().await;
        let before = data.len();
        let now = Instant::now();
        data.retain(|_, entry| entry.is_live(now));
        before - data.len()
    }

    fn build_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    async fn update_counter<F>(&self, key: &str, apply: F) -> CacheResult<u64>
    where
        F: FnOnce(u64) -> u64 + Send,
    {
        let full_key = self.build_key(key);
        let mut data = self.data.write().await;

        let entry = match data.get_mut(&full_key) {
            Some(entry) if entry.is_live(Instant::now()) => entry,
            _ => return Err(CacheError::miss(key)),
        };

        let current = parse_counter(key, &entry.value)?;
        let new_value = apply(current);
        entry.value = new_value.to_string().into_bytes();

        Ok(new_value)
    }
}

fn parse_counter(key: &str, value: &[u8]) -> CacheResult<u64> {
    std::str::from_utf8(value)
        .ok()
        .and_then(|s| s.trim().parse::<u64>().ok())
        .ok_or_else(|| {
            CacheError::Backend(format!(
                "cannot increment or decrement non-numeric value at {}",
                key
            ))
        })
}

#[async_trait]
impl Store for InMemoryStore {
    async fn get(&self, key: &str) -> CacheResult<Vec<u8>> {
        let data = self.data.read().await;
        match data.get(&self.build_key(key)) {
            Some(entry) if entry.is_live(Instant::now()) => Ok(entry.value.clone()),
            _ => Err(CacheError::miss(key)),
        }
    }

    async fn put(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> CacheResult<()> {
        let entry = Entry::new(value, ttl);
        self.data.write().await.insert(self.build_key(key), entry);
        Ok(())
    }

    async fn add(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> CacheResult<bool> {
        let mut data = self.data.write().await;
        let full_key = self.build_key(key);

        if data
            .get(&full_key)
            .is_some_and(|entry| entry.is_live(Instant::now()))
        {
            return Ok(false);
        }

        data.insert(full_key, Entry::new(value, ttl));
        Ok(true)
    }

    async fn increment(&self, key: &str, delta: u64) -> CacheResult<u64> {
        self.update_counter(key, |current| current.wrapping_add(delta))
            .await
    }

    async fn decrement(&self, key: &str, delta: u64) -> CacheResult<u64> {
        self.update_counter(key, |current| current.saturating_sub(delta))
            .await
    }

    async fn forget(&self, key: &str) -> CacheResult<()> {
        self.data.write().await.remove(&self.build_key(key));
        Ok(())
    }

    async fn flush(&self) -> CacheResult<()> {
        self.data.write().await.clear();
        Ok(())
    }

    fn prefix(&self) -> &str {
        &self.prefix
    }
}

//! Helper functions for typed values.

use crate::error::{CacheError, CacheResult};
use crate::repository::Repository;
use serde::{Serialize, de::DeserializeOwned};
use std::time::Duration;

/// Get a typed value from the cache.
///
/// A miss is returned as `Ok(None)`.
pub async fn get_json<R: Repository + ?Sized, T: DeserializeOwned>(
    cache: &R,
    key: &str,
) -> CacheResult<Option<T>> {
    match cache.get(key).await {
        Ok(bytes) => {
            let value: T = serde_json::from_slice(&bytes)
                .map_err(|e| CacheError::Deserialization(e.to_string()))?;
            Ok(Some(value))
        }
        Err(err) if err.is_miss() => Ok(None),
        Err(err) => Err(err),
    }
}

/// Set a typed value in the cache.
pub async fn put_json<R: Repository + ?Sized, T: Serialize>(
    cache: &R,
    key: &str,
    value: &T,
    ttl: Option<Duration>,
) -> CacheResult<()> {
    let bytes =
        serde_json::to_vec(value).map_err(|e| CacheError::Serialization(e.to_string()))?;
    cache.put(key, bytes, ttl).await
}

/// Remember a value for a given duration.
///
/// If the key exists, returns the cached value.
/// If not, calls the factory function, caches the result, and returns it.
pub async fn remember<R, T, F, Fut>(
    cache: &R,
    key: &str,
    ttl: Duration,
    factory: F,
) -> CacheResult<T>
where
    R: Repository + ?Sized,
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = CacheResult<T>>,
{
    if let Some(value) = get_json(cache, key).await? {
        return Ok(value);
    }

    let value = factory().await?;
    put_json(cache, key, &value, Some(ttl)).await?;
    Ok(value)
}

/// Remember a value forever (no TTL).
pub async fn remember_forever<R, T, F, Fut>(cache: &R, key: &str, factory: F) -> CacheResult<T>
where
    R: Repository + ?Sized,
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = CacheResult<T>>,
{
    if let Some(value) = get_json(cache, key).await? {
        return Ok(value);
    }

    let value = factory().await?;
    put_json(cache, key, &value, None).await?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;
    use crate::service::CacheService;
    use serde::Deserialize;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct AdUnit {
        id: u32,
        slot: String,
    }

    #[tokio::test]
    async fn test_json_round_trip_on_tagged_view() {
        let cache = CacheService::new(InMemoryStore::new());
        let tagged = cache.tags(["adUnits"]);
        let unit = AdUnit {
            id: 7,
            slot: "sidebar".to_string(),
        };

        put_json(&tagged, "unit:7", &unit, None).await.unwrap();
        let loaded: Option<AdUnit> = get_json(&tagged, "unit:7").await.unwrap();
        assert_eq!(loaded, Some(unit));

        tagged.flush().await.unwrap();
        let loaded: Option<AdUnit> = get_json(&tagged, "unit:7").await.unwrap();
        assert_eq!(loaded, None);
    }

    #[tokio::test]
    async fn test_get_json_bad_payload() {
        let cache = CacheService::new(InMemoryStore::new());
        cache.forever("k", b"not json".to_vec()).await.unwrap();

        let err = get_json::<_, AdUnit>(&cache, "k").await.unwrap_err();
        assert!(matches!(err, CacheError::Deserialization(_)));
    }

    #[tokio::test]
    async fn test_remember_calls_factory_once() {
        let cache = CacheService::new(InMemoryStore::new());
        let counter = AtomicUsize::new(0);
        let calls = &counter;

        for _ in 0..3 {
            let value: u32 = remember(&cache, "answer", Duration::from_secs(60), move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(42)
            })
            .await
            .unwrap();
            assert_eq!(value, 42);
        }

        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_remember_forever_refills_after_flush() {
        let cache = CacheService::new(InMemoryStore::new());
        let tagged = cache.tags(["reports"]);
        let counter = AtomicUsize::new(0);
        let calls = &counter;

        let load = move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, CacheError>("report".to_string())
        };

        remember_forever(&tagged, "daily", load).await.unwrap();
        remember_forever(&tagged, "daily", load).await.unwrap();
        tagged.flush().await.unwrap();
        remember_forever(&tagged, "daily", load).await.unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_remember_factory_error_not_cached() {
        let cache = CacheService::new(InMemoryStore::new());

        let result: CacheResult<u32> = remember_forever(&cache, "k", || async {
            Err(CacheError::Backend("upstream down".to_string()))
        })
        .await;

        assert!(result.is_err());
        assert!(!cache.has("k").await.unwrap());
    }
}

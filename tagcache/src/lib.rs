//! Tag-based cache invalidation on top of plain key/value stores.
//!
//! Values are cached under a caller key plus a set of tags. Flushing a tag
//! invalidates every value ever cached under it in O(1): the tag's version
//! identifier is replaced, which changes the hashed namespace every physical
//! key is derived from. Nothing is enumerated or deleted; stale entries are
//! left for the backend to evict.
//!
//! # Features
//!
//! - `memcached` - Enable the Memcached store
//! - `redis` - Enable the Redis store
//!
//! # Key layout
//!
//! | What | Physical key |
//! |------|--------------|
//! | tag version identifier | `tag:<name>:key` |
//! | tagged item | `hex(sha1(<id1>\|<id2>\|...)) + ":" + key` |
//! | untagged item | `key` |
//!
//! A store may additionally prepend its own `<prefix>:`.
//!
//! # Examples
//!
//! ```
//! use tagcache::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), CacheError> {
//! let cache = CacheService::new(InMemoryStore::with_prefix("cn"));
//!
//! let ad_units = cache.tags(["adUnits"]);
//! ad_units.forever("goodwin.com/ad-units", b"[1,2,3]".to_vec()).await?;
//! assert_eq!(ad_units.get("goodwin.com/ad-units").await?, b"[1,2,3]");
//!
//! // Invalidate everything tagged "adUnits"
//! ad_units.flush().await?;
//! assert!(ad_units.get("goodwin.com/ad-units").await.unwrap_err().is_miss());
//! # Ok(())
//! # }
//! ```
//!
//! ## Memcached Store (requires `memcached` feature)
//!
//! ```ignore
//! use tagcache::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), CacheError> {
//!     let config = CacheConfig::from_env()?;
//!     let cache = CacheService::new(MemcachedStore::new(config).await?);
//!
//!     let hits = cache.tags(["stats", "site:42"]);
//!     hits.forever("views", b"0".to_vec()).await?;
//!     hits.increment("views", 1).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod helpers;
pub mod memory;
pub mod repository;
pub mod service;
pub mod store;
pub mod tag_set;
pub mod tagged;

#[cfg(feature = "redis")]
pub mod redis_store;

#[cfg(feature = "memcached")]
pub mod memcached_store;

pub use config::{CacheBackend, CacheConfig};
pub use error::{CacheError, CacheResult, ErrorKind};
pub use helpers::*;
pub use memory::InMemoryStore;
pub use repository::Repository;
pub use service::CacheService;
pub use store::Store;
pub use tag_set::{TagSet, generate_identifier, tag_key};
pub use tagged::{TaggedCache, namespaced_key};

#[cfg(feature = "redis")]
pub use redis_store::RedisStore;

#[cfg(feature = "memcached")]
pub use memcached_store::MemcachedStore;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::CacheConfig;
    pub use crate::error::{CacheError, CacheResult};
    pub use crate::memory::InMemoryStore;
    pub use crate::repository::Repository;
    pub use crate::service::CacheService;
    pub use crate::store::Store;
    pub use crate::tagged::TaggedCache;

    #[cfg(feature = "redis")]
    pub use crate::redis_store::RedisStore;

    #[cfg(feature = "memcached")]
    pub use crate::memcached_store::MemcachedStore;
}

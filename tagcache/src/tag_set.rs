//! Tag version identifiers and namespace derivation.

use crate::error::{CacheError, CacheResult};
use crate::store::Store;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};
use uuid::Uuid;

/// Separator between tag identifiers in a namespace.
pub const NAMESPACE_SEPARATOR: &str = "|";

/// Store key holding the current version identifier of tag `name`.
///
/// ```
/// assert_eq!(tagcache::tag_key("adUnits"), "tag:adUnits:key");
/// ```
pub fn tag_key(name: &str) -> String {
    format!("tag:{}:key", name)
}

/// Produce a fresh tag version identifier.
///
/// 32 lowercase hex characters from a random v4 UUID. Only uniqueness is
/// promised; identifiers carry no ordering or time.
pub fn generate_identifier() -> String {
    Uuid::new_v4().simple().to_string()
}

/// An ordered list of tag names bound to a store.
///
/// The set itself is never persisted. Each tag's only state is its version
/// identifier, stored forever under [`tag_key`]. Order is significant: the
/// namespace joins identifiers in the order the names were given.
///
/// Lookup of a never-seen tag is read-then-write without atomicity. Two
/// callers racing on first use may both create an identifier; the loser's
/// keys simply become unreachable, which is at worst a redundant invalidation.
pub struct TagSet<S: Store> {
    store: Arc<S>,
    names: Vec<String>,
}

impl<S: Store> TagSet<S> {
    /// Create a tag set over `names`.
    pub fn new<I, T>(store: Arc<S>, names: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            store,
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Tag names in namespace order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Whether the set has no tags.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Store a new identifier for `name` and return it.
    ///
    /// Used both to initialise an unseen tag and to invalidate an existing one.
    pub async fn reset_tag(&self, name: &str) -> CacheResult<String> {
        let id = generate_identifier();
        self.store
            .forever(&tag_key(name), id.clone().into_bytes())
            .await?;

        debug!(tag = name, id = %id, "tag identifier reset");
        Ok(id)
    }

    /// Current identifier for `name`, creating one on a miss.
    ///
    /// # Errors
    ///
    /// Any store error other than a miss is returned unchanged.
    pub async fn tag_identifier(&self, name: &str) -> CacheResult<String> {
        let key = tag_key(name);

        match self.store.get(&key).await {
            Ok(raw) => String::from_utf8(raw).map_err(|_| {
                CacheError::Backend(format!("tag identifier at {} is not valid UTF-8", key))
            }),
            Err(err) if err.is_miss() => self.reset_tag(name).await,
            Err(err) => Err(err),
        }
    }

    /// Identifiers for every tag, in set order.
    pub async fn identifiers(&self) -> CacheResult<Vec<String>> {
        // Sequential on purpose: a name listed twice must resolve to one identifier.
        let mut ids = Vec::with_capacity(self.names.len());
        for name in &self.names {
            ids.push(self.tag_identifier(name).await?);
        }
        Ok(ids)
    }

    /// The `|`-joined identifiers of every tag. Empty for an empty set.
    pub async fn namespace(&self) -> CacheResult<String> {
        let namespace = self.identifiers().await?.join(NAMESPACE_SEPARATOR);
        trace!(tags = ?self.names, namespace = %namespace, "namespace resolved");
        Ok(namespace)
    }

    /// Regenerate the identifier of every tag in the set.
    ///
    /// Stops at the first failure. Tags reset before the failure stay reset.
    pub async fn invalidate_all(&self) -> CacheResult<()> {
        for name in &self.names {
            self.reset_tag(name).await?;
        }
        Ok(())
    }
}

impl<S: Store> Clone for TagSet<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            names: self.names.clone(),
        }
    }
}

impl<S: Store> fmt::Debug for TagSet<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TagSet").field("names", &self.names).finish()
    }
}

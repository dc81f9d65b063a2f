//! Error types for cache operations.

use thiserror::Error;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Coarse classification of a [`CacheError`].
///
/// A miss is an expected outcome, not a fault. Callers that only care about
/// "was it there" should branch on the kind instead of matching variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The key is absent, expired, or unreachable after a flush.
    Miss,
    /// The store failed for any other reason.
    Backend,
    /// The caller supplied unusable input or configuration.
    Invalid,
}

/// Cache-specific errors.
///
/// Backends translate their native errors into these variants; nothing above
/// the store layer names a backend error type.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Key not present in the store
    #[error("Cache miss: {0}")]
    Miss(String),

    /// Store failure (protocol, server or value error)
    #[error("Backend error: {0}")]
    Backend(String),

    /// Connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Operation timeout
    #[error("Operation timeout")]
    Timeout,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Caller input rejected before reaching the store
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization error
    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

impl CacheError {
    /// Build a miss for `key`.
    pub fn miss(key: impl Into<String>) -> Self {
        Self::Miss(key.into())
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Miss(_) => ErrorKind::Miss,
            Self::Config(_) | Self::InvalidUrl(_) | Self::InvalidInput(_) => ErrorKind::Invalid,
            Self::Backend(_)
            | Self::Connection(_)
            | Self::Timeout
            | Self::Serialization(_)
            | Self::Deserialization(_) => ErrorKind::Backend,
        }
    }

    /// Check if this error is a cache miss.
    pub fn is_miss(&self) -> bool {
        self.kind() == ErrorKind::Miss
    }

    /// Check if this error indicates connection loss.
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Timeout)
    }
}

/// Turn a miss into `None`, keeping every other error.
pub(crate) fn miss_to_none<T>(result: CacheResult<T>) -> CacheResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_miss() => Ok(None),
        Err(err) => Err(err),
    }
}

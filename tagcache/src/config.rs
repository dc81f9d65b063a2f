//! Cache configuration types.

use crate::error::{CacheError, CacheResult};
use std::fmt;
use std::time::Duration;

/// Cache backend type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackend {
    /// In-process map
    Memory,
    /// Memcached backend
    Memcached,
    /// Redis backend
    Redis,
}

impl CacheBackend {
    /// Parse a backend name (`memory`, `memcached`, `redis`).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "memory" | "inmemory" | "in-memory" => Some(Self::Memory),
            "memcache" | "memcached" => Some(Self::Memcached),
            "redis" => Some(Self::Redis),
            _ => None,
        }
    }
}

impl fmt::Display for CacheBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => write!(f, "Memory"),
            Self::Memcached => write!(f, "Memcached"),
            Self::Redis => write!(f, "Redis"),
        }
    }
}

/// Cache configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Cache backend type
    pub backend: CacheBackend,

    /// Server addresses (`host:port` or a full URL)
    pub servers: Vec<String>,

    /// Key prefix for all cache keys
    pub key_prefix: Option<String>,

    /// Default TTL for entries stored without one
    pub default_ttl: Option<Duration>,

    /// Connection timeout
    pub connection_timeout: Duration,

    /// Read/write timeout for a single operation
    pub operation_timeout: Duration,

    /// Maximum idle connections kept per client
    pub max_idle_connections: u32,
}

impl CacheConfig {
    fn with_backend(backend: CacheBackend, servers: Vec<String>) -> Self {
        Self {
            backend,
            servers,
            key_prefix: None,
            default_ttl: None,
            connection_timeout: Duration::from_secs(5),
            operation_timeout: Duration::from_millis(100),
            max_idle_connections: 2,
        }
    }

    /// Configuration for an in-process store.
    pub fn memory() -> Self {
        Self::with_backend(CacheBackend::Memory, Vec::new())
    }

    /// Create a new Memcached cache configuration.
    ///
    /// # Examples
    ///
    /// ```
    /// use tagcache::CacheConfig;
    ///
    /// let config = CacheConfig::memcached("localhost:11211");
    /// assert_eq!(config.servers, vec!["localhost:11211".to_string()]);
    /// ```
    pub fn memcached(server: impl Into<String>) -> Self {
        Self::with_backend(CacheBackend::Memcached, vec![server.into()])
    }

    /// Create a new Redis cache configuration.
    ///
    /// # Examples
    ///
    /// ```
    /// use tagcache::CacheConfig;
    ///
    /// let config = CacheConfig::redis("redis://localhost:6379");
    /// ```
    pub fn redis(url: impl Into<String>) -> Self {
        Self::with_backend(CacheBackend::Redis, vec![url.into()])
    }

    /// Load configuration from environment variables.
    ///
    /// | Variable | Meaning |
    /// |----------|---------|
    /// | `TAGCACHE_BACKEND` | `memory`, `memcached` or `redis` (default `memory`) |
    /// | `TAGCACHE_SERVERS` | comma-separated server list |
    /// | `TAGCACHE_PREFIX` | key prefix |
    /// | `TAGCACHE_DEFAULT_TTL_SECS` | default TTL in seconds |
    /// | `TAGCACHE_TIMEOUT_MS` | read/write timeout in milliseconds |
    /// | `TAGCACHE_MAX_IDLE_CONNECTIONS` | idle connection pool size |
    pub fn from_env() -> CacheResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> CacheResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend = match lookup("TAGCACHE_BACKEND") {
            Some(name) => CacheBackend::parse(&name).ok_or_else(|| {
                CacheError::Config(format!("unknown cache backend: {}", name))
            })?,
            None => CacheBackend::Memory,
        };

        let servers = lookup("TAGCACHE_SERVERS")
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        let mut config = Self::with_backend(backend, servers);

        if let Some(prefix) = lookup("TAGCACHE_PREFIX")
            && !prefix.is_empty()
        {
            config = config.with_key_prefix(prefix);
        }

        if let Some(secs) = lookup("TAGCACHE_DEFAULT_TTL_SECS") {
            let secs = parse_number("TAGCACHE_DEFAULT_TTL_SECS", &secs)?;
            config = config.with_default_ttl(Duration::from_secs(secs));
        }

        if let Some(ms) = lookup("TAGCACHE_TIMEOUT_MS") {
            let ms = parse_number("TAGCACHE_TIMEOUT_MS", &ms)?;
            config = config.with_operation_timeout(Duration::from_millis(ms));
        }

        if let Some(max) = lookup("TAGCACHE_MAX_IDLE_CONNECTIONS") {
            let max = parse_number("TAGCACHE_MAX_IDLE_CONNECTIONS", &max)?;
            let max = u32::try_from(max).map_err(|_| {
                CacheError::Config(format!("TAGCACHE_MAX_IDLE_CONNECTIONS out of range: {}", max))
            })?;
            config = config.with_max_idle_connections(max);
        }

        config.validate()?;
        Ok(config)
    }

    /// Add another server.
    pub fn with_server(mut self, server: impl Into<String>) -> Self {
        self.servers.push(server.into());
        self
    }

    /// Set the key prefix.
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    /// Set the default TTL.
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl);
        self
    }

    /// Set the connection timeout.
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Set the read/write timeout.
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Set the idle connection pool size.
    pub fn with_max_idle_connections(mut self, max: u32) -> Self {
        self.max_idle_connections = max;
        self
    }

    /// Check the configuration is usable for its backend.
    pub fn validate(&self) -> CacheResult<()> {
        if self.backend != CacheBackend::Memory && self.servers.is_empty() {
            return Err(CacheError::Config(format!(
                "{} backend requires at least one server",
                self.backend
            )));
        }

        if self.max_idle_connections == 0 && self.backend == CacheBackend::Memcached {
            return Err(CacheError::Config(
                "max_idle_connections must be at least 1".to_string(),
            ));
        }

        if self
            .key_prefix
            .as_deref()
            .is_some_and(|prefix| prefix.chars().any(char::is_whitespace))
        {
            return Err(CacheError::Config(
                "key prefix must not contain whitespace".to_string(),
            ));
        }

        Ok(())
    }

    /// Fail unless this configuration targets `backend`.
    pub fn require_backend(&self, backend: CacheBackend) -> CacheResult<()> {
        if self.backend != backend {
            return Err(CacheError::Config(format!(
                "expected a {} configuration, got {}",
                backend, self.backend
            )));
        }
        Ok(())
    }

    /// The colon-terminated prefix applied to every key, or `""`.
    pub fn prefix(&self) -> String {
        match &self.key_prefix {
            Some(prefix) => format!("{}:", prefix),
            None => String::new(),
        }
    }

    /// Build the final key with prefix if configured.
    pub fn build_key(&self, key: &str) -> String {
        match &self.key_prefix {
            Some(prefix) => format!("{}:{}", prefix, key),
            None => key.to_string(),
        }
    }
}

fn parse_number(name: &str, value: &str) -> CacheResult<u64> {
    value
        .trim()
        .parse()
        .map_err(|_| CacheError::Config(format!("{} must be a number, got {:?}", name, value)))
}

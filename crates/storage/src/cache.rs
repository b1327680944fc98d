//! Cache management system
//!
//! This module provides an in-memory cache with LRU eviction, TTL support and a
//! byte budget. It backs the query client's result cache.

use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use thiserror::Error;

/// Cache error types
#[derive(Debug, Error)]
pub enum CacheError {
    /// Entry expired
    #[error("Entry expired: {0}")]
    Expired(String),

    /// Value alone exceeds the byte budget
    #[error("Value for {key} is {size} bytes, over the {max} byte limit")]
    TooLarge {
        /// Cache key
        key: String,
        /// Weight of the rejected value
        size: usize,
        /// Configured budget
        max: usize,
    },
}

/// Result type for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;

/// Approximate in-memory size of a cached value
pub trait Weighted {
    /// Size in bytes used against `CacheConfig::max_size_bytes`
    fn weight(&self) -> usize;
}

impl Weighted for String {
    fn weight(&self) -> usize {
        self.len()
    }
}

/// Cache entry with metadata
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Option<SystemTime>,
    size: usize,
}

impl<V> CacheEntry<V> {
    fn new(value: V, ttl: Option<Duration>, size: usize) -> Self {
        let expires_at = ttl.map(|d| SystemTime::now() + d);
        Self { value, expires_at, size }
    }

    fn is_expired(&self) -> bool {
        if let Some(expires_at) = self.expires_at {
            SystemTime::now() > expires_at
        } else {
            false
        }
    }
}

/// Cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries in memory cache
    pub max_entries: usize,
    /// Maximum size in bytes
    pub max_size_bytes: usize,
    /// Default TTL for entries
    pub default_ttl: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            max_size_bytes: 100 * 1024 * 1024,            // 100MB
            default_ttl: Some(Duration::from_secs(3600)), // 1 hour
        }
    }
}

impl CacheConfig {
    /// Create a new cache configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum entries
    pub fn max_entries(mut self, max: usize) -> Self {
        self.max_entries = max;
        self
    }

    /// Set maximum size in bytes
    pub fn max_size_bytes(mut self, bytes: usize) -> Self {
        self.max_size_bytes = bytes;
        self
    }

    /// Set default TTL
    pub fn default_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.default_ttl = ttl;
        self
    }
}

struct Inner<V> {
    entries: LruCache<String, CacheEntry<V>>,
    current_size: usize,
}

impl<V> Inner<V> {
    fn pop(&mut self, key: &str) -> Option<CacheEntry<V>> {
        let entry = self.entries.pop(key)?;
        self.current_size = self.current_size.saturating_sub(entry.size);
        Some(entry)
    }
}

/// In-memory LRU cache
///
/// Clones share the same underlying storage.
pub struct MemoryCache<V> {
    inner: Arc<Mutex<Inner<V>>>,
    config: CacheConfig,
}

impl<V> Clone for MemoryCache<V> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner), config: self.config.clone() }
    }
}

impl<V: Clone + Weighted> MemoryCache<V> {
    /// Create a new memory cache
    pub fn new(config: CacheConfig) -> Self {
        let capacity = NonZeroUsize::new(config.max_entries).unwrap_or(NonZeroUsize::MIN);

        Self {
            inner: Arc::new(Mutex::new(Inner {
                entries: LruCache::new(capacity),
                current_size: 0,
            })),
            config,
        }
    }

    /// Get a value from the cache
    ///
    /// An expired entry is dropped and reported as [`CacheError::Expired`].
    pub fn get(&self, key: &str) -> Result<Option<V>> {
        let mut inner = self.inner.lock();

        let is_expired = inner.entries.peek(key).map(|e| e.is_expired()).unwrap_or(false);
        if is_expired {
            inner.pop(key);
            return Err(CacheError::Expired(key.to_string()));
        }

        Ok(inner.entries.get(key).map(|entry| entry.value.clone()))
    }

    /// Put a value in the cache
    ///
    /// A value heavier than the whole budget is rejected and the cache is left
    /// untouched.
    pub fn put(&self, key: impl Into<String>, value: V, ttl: Option<Duration>) -> Result<()> {
        let key = key.into();
        let size = value.weight();
        if size > self.config.max_size_bytes {
            return Err(CacheError::TooLarge { key, size, max: self.config.max_size_bytes });
        }
        let entry = CacheEntry::new(value, ttl.or(self.config.default_ttl), size);

        let mut inner = self.inner.lock();

        if let Some(old_entry) = inner.entries.pop(&key) {
            inner.current_size = inner.current_size.saturating_sub(old_entry.size);
        }

        // Evict entries if we exceed size limit
        while inner.current_size + size > self.config.max_size_bytes && !inner.entries.is_empty() {
            if let Some((_, evicted)) = inner.entries.pop_lru() {
                inner.current_size = inner.current_size.saturating_sub(evicted.size);
            }
        }

        if let Some((_, evicted)) = inner.entries.push(key, entry) {
            inner.current_size = inner.current_size.saturating_sub(evicted.size);
        }
        inner.current_size += size;

        Ok(())
    }

    /// Remove a value from the cache
    pub fn remove(&self, key: &str) -> Result<bool> {
        Ok(self.inner.lock().pop(key).is_some())
    }

    /// Remove every key starting with `prefix`, returning how many were removed
    pub fn remove_prefix(&self, prefix: &str) -> usize {
        let mut inner = self.inner.lock();
        let keys: Vec<String> = inner
            .entries
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect();

        keys.iter().filter(|k| inner.pop(k).is_some()).count()
    }

    /// Clear all entries
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.current_size = 0;
    }

    /// Get the number of entries
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Check if cache is empty
    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    /// Get current size in bytes
    pub fn size_bytes(&self) -> usize {
        self.inner.lock().current_size
    }
}

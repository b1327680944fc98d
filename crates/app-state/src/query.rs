//! Query management
//!
//! This module provides a reactive query system similar to TanStack Query for managing
//! server state with caching, request deduplication, background refetching, and
//! stale-while-revalidate patterns.
//!
//! One [`QueryClient`] is constructed at startup and shared by every component
//! through a context scope; clones are cheap handles onto the same cache.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use storage::{CacheConfig, CacheError, MemoryCache};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Query errors
#[derive(Debug, Error)]
pub enum QueryError {
    /// Query fetch failed
    #[error("Query fetch failed: {0}")]
    FetchError(String),

    /// Cache error
    #[error("Cache error: {0}")]
    CacheError(#[from] CacheError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Result type for query operations
pub type Result<T> = std::result::Result<T, QueryError>;

/// Query key for identifying and caching queries
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryKey {
    /// Scope of the query (e.g., "users", "projects")
    pub scope: String,

    /// Unique identifier within the scope
    pub id: String,

    /// Optional parameters, kept sorted so equal keys hash equally
    pub params: BTreeMap<String, String>,
}

impl QueryKey {
    /// Create a new query key
    pub fn new(scope: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            id: id.into(),
            params: BTreeMap::new(),
        }
    }

    /// Add a parameter to the query key
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Convert to cache key string
    pub fn to_cache_key(&self) -> String {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.scope.hash(&mut hasher);
        self.id.hash(&mut hasher);
        self.params.hash(&mut hasher);
        format!("{}{}:{:x}", scope_prefix(&self.scope), self.id, hasher.finish())
    }
}

/// Scopes are percent-encoded so `users` never prefixes `users:admin`
fn scope_prefix(scope: &str) -> String {
    format!("query:{}:", urlencoding::encode(scope))
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.scope, self.id)?;
        if !self.params.is_empty() {
            let params: Vec<String> =
                self.params.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
            write!(f, "?{}", params.join("&"))?;
        }
        Ok(())
    }
}

/// Query state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryState {
    /// Query is idle (not fetching)
    Idle,

    /// Query is fetching data
    Fetching,

    /// Query fetch succeeded
    Success,

    /// Query fetch failed
    Error,
}

/// Query metadata
#[derive(Debug, Clone)]
struct QueryMeta {
    state: QueryState,
    stale_at: Option<Instant>,
    fetch_count: u32,
    last_error: Option<String>,
}

impl QueryMeta {
    fn new() -> Self {
        Self {
            state: QueryState::Idle,
            stale_at: None,
            fetch_count: 0,
            last_error: None,
        }
    }

    fn is_stale(&self) -> bool {
        if let Some(stale_at) = self.stale_at {
            Instant::now() >= stale_at
        } else {
            true
        }
    }
}

/// Per-query behaviour
#[derive(Debug, Clone, PartialEq)]
pub struct QueryConfig {
    /// Time until data becomes stale
    pub stale_time: Duration,

    /// Time until data is garbage collected
    pub cache_time: Duration,

    /// Enable background refetching when stale
    pub refetch_on_stale: bool,

    /// Retry failed queries
    pub retry: bool,

    /// Retries after the first failed attempt
    pub retry_count: u32,

    /// Retry delay
    pub retry_delay: Duration,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            stale_time: Duration::from_secs(5 * 60),
            cache_time: Duration::from_secs(10 * 60),
            refetch_on_stale: true,
            retry: true,
            retry_count: 1,
            retry_delay: Duration::from_secs(1),
        }
    }
}

impl QueryConfig {
    fn max_attempts(&self) -> u32 {
        if self.retry {
            self.retry_count + 1
        } else {
            1
        }
    }
}

/// Configuration for constructing a [`QueryClient`]
#[derive(Debug, Clone, Default)]
pub struct QueryClientConfig {
    /// Result cache limits
    pub cache: CacheConfig,
    /// Options applied to queries that don't override [`Query::config`]
    pub default_options: QueryConfig,
}

impl QueryClientConfig {
    /// Create a configuration with default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cache configuration
    pub fn cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    /// Set the default query options
    pub fn default_options(mut self, options: QueryConfig) -> Self {
        self.default_options = options;
        self
    }
}

/// Query trait for defining data fetching logic
#[async_trait]
pub trait Query: Send + Sync + Clone {
    /// The type of data this query returns
    type Data: Serialize + DeserializeOwned + Clone + Send + Sync;

    /// Fetch the data
    async fn fetch(&self) -> Result<Self::Data>;

    /// Get the query key
    fn key(&self) -> QueryKey;

    /// Per-query options; `None` uses the client's defaults
    fn config(&self) -> Option<QueryConfig> {
        None
    }
}

type MetaMap = Arc<RwLock<HashMap<String, QueryMeta>>>;

/// Query client for managing queries
///
/// Clones share the cache, metadata and in-flight bookkeeping.
#[derive(Clone)]
pub struct QueryClient {
    cache: MemoryCache<String>,
    meta: MetaMap,
    background_tasks: Arc<Mutex<HashMap<String, JoinHandle<()>>>>,
    fetch_locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
    default_options: QueryConfig,
}

impl fmt::Debug for QueryClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryClient")
            .field("cached_entries", &self.cache.len())
            .field("default_options", &self.default_options)
            .finish()
    }
}

impl QueryClient {
    /// Create a new query client
    pub fn new(config: QueryClientConfig) -> Self {
        Self {
            cache: MemoryCache::new(config.cache),
            meta: Arc::new(RwLock::new(HashMap::new())),
            background_tasks: Arc::new(Mutex::new(HashMap::new())),
            fetch_locks: Arc::new(Mutex::new(HashMap::new())),
            default_options: config.default_options,
        }
    }

    /// Options used for queries without their own config
    pub fn default_options(&self) -> &QueryConfig {
        &self.default_options
    }

    /// Whether two handles share the same cache
    pub fn same_client(&self, other: &QueryClient) -> bool {
        Arc::ptr_eq(&self.meta, &other.meta)
    }

    fn options_for<Q: Query>(&self, query: &Q) -> QueryConfig {
        query.config().unwrap_or_else(|| self.default_options.clone())
    }

    /// Get query data, using cache if available
    ///
    /// Concurrent calls for the same key share one fetch.
    pub async fn get<Q: Query + 'static>(&self, query: &Q) -> Result<Q::Data> {
        let cache_key = query.key().to_cache_key();

        if let Some(data) = self.cached::<Q>(query, &cache_key).await? {
            return Ok(data);
        }

        let lock = self.fetch_lock(&cache_key).await;
        let result = self.fetch_exclusive(query, &cache_key, &lock).await;
        self.release_fetch_lock(&cache_key, lock).await;
        result
    }

    async fn fetch_exclusive<Q: Query + 'static>(
        &self,
        query: &Q,
        cache_key: &str,
        lock: &Mutex<()>,
    ) -> Result<Q::Data> {
        let _guard = lock.lock().await;

        // Another caller may have filled the cache while we waited
        if let Some(data) = self.cached::<Q>(query, cache_key).await? {
            return Ok(data);
        }

        self.fetch(query).await
    }

    async fn cached<Q: Query + 'static>(
        &self,
        query: &Q,
        cache_key: &str,
    ) -> Result<Option<Q::Data>> {
        let cached = match self.cache.get(cache_key) {
            Ok(Some(cached)) => cached,
            _ => return Ok(None),
        };
        let data: Q::Data = serde_json::from_str(&cached)?;

        let is_stale = self.meta.read().await.get(cache_key).map(QueryMeta::is_stale);
        if is_stale == Some(true) && self.options_for(query).refetch_on_stale {
            self.spawn_background_refetch(query.clone(), cache_key.to_string()).await;
        }

        Ok(Some(data))
    }

    async fn fetch_lock(&self, cache_key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.fetch_locks.lock().await;
        Arc::clone(locks.entry(cache_key.to_string()).or_default())
    }

    /// Drop the key's lock once the map holds the only other reference
    async fn release_fetch_lock(&self, cache_key: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self.fetch_locks.lock().await;
        let is_current = locks.get(cache_key).is_some_and(|current| Arc::ptr_eq(current, &lock));
        if is_current && Arc::strong_count(&lock) == 2 {
            locks.remove(cache_key);
        }
    }

    /// Spawn a background refetch task for stale data
    async fn spawn_background_refetch<Q: Query + 'static>(&self, query: Q, cache_key: String) {
        let mut tasks = self.background_tasks.lock().await;
        if tasks.contains_key(&cache_key) {
            return;
        }

        let cache = self.cache.clone();
        let meta = Arc::clone(&self.meta);
        let background_tasks = Arc::clone(&self.background_tasks);
        let config = self.options_for(&query);
        let task_cache_key = cache_key.clone();

        let handle = tokio::spawn(async move {
            if let Err(e) = run_fetch(&query, &task_cache_key, &cache, &meta, &config).await {
                tracing::warn!(key = %query.key(), "Background refetch failed: {}", e);
            }
            background_tasks.lock().await.remove(&task_cache_key);
        });

        tasks.insert(cache_key, handle);
    }

    /// Fetch query data (always fetches, ignoring cache)
    pub async fn fetch<Q: Query>(&self, query: &Q) -> Result<Q::Data> {
        let cache_key = query.key().to_cache_key();
        let config = self.options_for(query);
        run_fetch(query, &cache_key, &self.cache, &self.meta, &config).await
    }

    /// Prefetch query data in the background
    pub async fn prefetch<Q: Query + 'static>(&self, query: Q) {
        let client = self.clone();
        tokio::spawn(async move {
            if let Err(e) = client.fetch(&query).await {
                tracing::debug!(key = %query.key(), "Prefetch failed: {}", e);
            }
        });
    }

    /// Seed or overwrite cached data for a key
    pub async fn set_query_data<T: Serialize>(&self, key: &QueryKey, data: &T) -> Result<()> {
        let cache_key = key.to_cache_key();
        let serialized = serde_json::to_string(data)?;
        self.cache.put(cache_key.clone(), serialized, Some(self.default_options.cache_time))?;

        let mut meta = self.meta.write().await;
        let query_meta = meta.entry(cache_key).or_insert_with(QueryMeta::new);
        query_meta.state = QueryState::Success;
        query_meta.stale_at = Some(Instant::now() + self.default_options.stale_time);
        query_meta.last_error = None;
        Ok(())
    }

    /// Read cached data without fetching
    pub fn get_query_data<T: DeserializeOwned>(&self, key: &QueryKey) -> Result<Option<T>> {
        match self.cache.get(&key.to_cache_key()) {
            Ok(Some(cached)) => Ok(Some(serde_json::from_str(&cached)?)),
            Ok(None) | Err(CacheError::Expired(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Invalidate cached query data
    pub async fn invalidate(&self, key: &QueryKey) -> Result<()> {
        let cache_key = key.to_cache_key();
        {
            let mut meta = self.meta.write().await;
            self.cache.remove(&cache_key)?;
            meta.remove(&cache_key);
        }
        self.fetch_locks.lock().await.remove(&cache_key);
        Ok(())
    }

    /// Invalidate all queries matching a scope
    pub async fn invalidate_scope(&self, scope: &str) -> Result<()> {
        let prefix = scope_prefix(scope);
        let removed = {
            let mut meta = self.meta.write().await;
            meta.retain(|k, _| !k.starts_with(&prefix));
            self.cache.remove_prefix(&prefix)
        };
        self.fetch_locks.lock().await.retain(|k, _| !k.starts_with(&prefix));
        tracing::debug!(scope, removed, "Invalidated query scope");

        Ok(())
    }

    /// Get query state
    pub async fn state(&self, key: &QueryKey) -> QueryState {
        let cache_key = key.to_cache_key();
        let meta = self.meta.read().await;
        meta.get(&cache_key).map(|m| m.state).unwrap_or(QueryState::Idle)
    }

    /// Number of fetches started for a key
    pub async fn fetch_count(&self, key: &QueryKey) -> u32 {
        let meta = self.meta.read().await;
        meta.get(&key.to_cache_key()).map(|m| m.fetch_count).unwrap_or(0)
    }

    /// Last error recorded for a key
    pub async fn last_error(&self, key: &QueryKey) -> Option<String> {
        let meta = self.meta.read().await;
        meta.get(&key.to_cache_key()).and_then(|m| m.last_error.clone())
    }

    /// Clear all cached queries
    pub async fn clear(&self) -> Result<()> {
        {
            let mut meta = self.meta.write().await;
            self.cache.clear();
            meta.clear();
        }
        self.fetch_locks.lock().await.clear();
        Ok(())
    }
}

/// Fetch with retries, writing the result into the cache and metadata
async fn run_fetch<Q: Query>(
    query: &Q,
    cache_key: &str,
    cache: &MemoryCache<String>,
    meta: &MetaMap,
    config: &QueryConfig,
) -> Result<Q::Data> {
    {
        let mut meta = meta.write().await;
        let query_meta = meta.entry(cache_key.to_string()).or_insert_with(QueryMeta::new);
        query_meta.state = QueryState::Fetching;
        query_meta.fetch_count += 1;
    }

    let max_attempts = config.max_attempts();
    let mut attempt = 0;
    let error = loop {
        attempt += 1;
        match query.fetch().await {
            Ok(data) => {
                let serialized = serde_json::to_string(&data)?;
                let mut meta = meta.write().await;

                // Invalidated while in flight
                let Some(query_meta) = meta.get_mut(cache_key) else {
                    tracing::debug!(key = cache_key, "Query invalidated during fetch, not caching");
                    return Ok(data);
                };

                if let Err(e) = cache.put(cache_key, serialized, Some(config.cache_time)) {
                    tracing::warn!(key = cache_key, "Failed to cache query result: {}", e);
                }
                query_meta.state = QueryState::Success;
                query_meta.stale_at = Some(Instant::now() + config.stale_time);
                query_meta.last_error = None;

                return Ok(data);
            }
            Err(e) if attempt >= max_attempts => break e,
            Err(e) => {
                tracing::debug!(key = cache_key, attempt, "Query attempt failed: {}", e);
                tokio::time::sleep(config.retry_delay).await;
            }
        }
    };

    let mut meta = meta.write().await;
    if let Some(query_meta) = meta.get_mut(cache_key) {
        query_meta.state = QueryState::Error;
        query_meta.last_error = Some(error.to_string());
    }

    Err(error)
}

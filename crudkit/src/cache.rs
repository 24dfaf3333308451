//! Response cache and Redis connection pool management
//!
//! Handlers cache serialized responses under two keys per resource
//! namespace: `{ns}:all` for the last listing and `{ns}:{id}` for a single
//! record. Values are stored as the `{"data": ...}` envelope with a TTL.
//!
//! The cache is best-effort. [`ResponseCache`] logs and swallows every store
//! failure, so a broken Redis never fails a request.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

#[cfg(feature = "cache")]
use crate::config::RedisConfig;
use crate::error::Result;
use crate::repository::RecordId;

#[cfg(feature = "cache")]
use deadpool_redis::{Config as DeadpoolConfig, Pool, Runtime};

/// Key/value store with expiry
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Value under `key`; `Ok(None)` on a miss
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key` for `ttl`
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    /// Remove `key`
    async fn unset(&self, key: &str) -> Result<()>;
}

/// [`CacheStore`] backed by a deadpool-redis pool
#[cfg(feature = "cache")]
#[derive(Clone)]
pub struct RedisCache {
    pool: Pool,
}

#[cfg(feature = "cache")]
impl RedisCache {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    async fn connection(&self) -> Result<deadpool_redis::Connection> {
        self.pool
            .get()
            .await
            .map_err(|e| crate::error::Error::Internal(format!("Failed to get Redis connection: {}", e)))
    }
}

#[cfg(feature = "cache")]
#[async_trait]
impl CacheStore for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        use deadpool_redis::redis::AsyncCommands;

        let mut conn = self.connection().await?;
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        use deadpool_redis::redis::AsyncCommands;

        let mut conn = self.connection().await?;
        conn.set_ex::<_, _, ()>(key, value, ttl.as_secs().max(1)).await?;
        Ok(())
    }

    async fn unset(&self, key: &str) -> Result<()> {
        use deadpool_redis::redis::AsyncCommands;

        let mut conn = self.connection().await?;
        conn.del::<_, ()>(key).await?;
        Ok(())
    }
}

/// Cache keys of one resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKeys {
    namespace: String,
}

impl CacheKeys {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// `{ns}:all`
    pub fn all(&self) -> String {
        format!("{}:all", self.namespace)
    }

    /// `{ns}:{id}`
    pub fn one(&self, id: RecordId) -> String {
        format!("{}:{}", self.namespace, id)
    }
}

#[derive(Serialize)]
struct Envelope<'a, T> {
    data: &'a T,
}

/// Best-effort response cache
#[derive(Clone)]
pub struct ResponseCache {
    store: Option<Arc<dyn CacheStore>>,
    ttl: Duration,
}

impl ResponseCache {
    pub fn new(store: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self {
            store: Some(store),
            ttl,
        }
    }

    /// A cache that never hits and stores nothing
    pub fn disabled() -> Self {
        Self {
            store: None,
            ttl: Duration::ZERO,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cached envelope under `key`, if any
    pub async fn get(&self, key: &str) -> Option<String> {
        let store = self.store.as_ref()?;
        match store.get(key).await {
            Ok(Some(value)) => {
                tracing::debug!(key, "Cache hit");
                Some(value)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(key, error = %e, "Cache read failed");
                None
            }
        }
    }

    /// Store `{"data": value}` under `key`
    pub async fn set<T: Serialize>(&self, key: &str, value: &T) {
        let Some(store) = self.store.as_ref() else {
            return;
        };
        let payload = match serde_json::to_string(&Envelope { data: value }) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(key, error = %e, "Cache value not serializable");
                return;
            }
        };
        if let Err(e) = store.set(key, &payload, self.ttl).await {
            tracing::warn!(key, error = %e, "Cache write failed");
        }
    }

    /// Remove `key`
    pub async fn unset(&self, key: &str) {
        let Some(store) = self.store.as_ref() else {
            return;
        };
        if let Err(e) = store.unset(key).await {
            tracing::warn!(key, error = %e, "Cache invalidation failed");
        }
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::disabled()
    }
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("enabled", &self.is_enabled())
            .field("ttl", &self.ttl)
            .finish()
    }
}

/// Create a Redis connection pool with retry logic
///
/// Used by `AppStateBuilder`; retries according to the configuration.
#[cfg(feature = "cache")]
pub async fn create_pool(config: &RedisConfig) -> Result<Pool> {
    create_pool_with_retries(config, config.max_retries).await
}

/// Create a Redis connection pool with configurable retries
///
/// Uses exponential backoff strategy for retries
#[cfg(feature = "cache")]
async fn create_pool_with_retries(config: &RedisConfig, max_retries: u32) -> Result<Pool> {
    let mut attempt = 0;
    let base_delay = Duration::from_secs(config.retry_delay_secs);

    loop {
        match try_create_pool(config).await {
            Ok(pool) => {
                if attempt > 0 {
                    tracing::info!(
                        "Redis connection established after {} attempt(s)",
                        attempt + 1
                    );
                } else {
                    tracing::info!(
                        "Redis connection pool created: max_connections={}",
                        config.max_connections
                    );
                }
                return Ok(pool);
            }
            Err(e) => {
                attempt += 1;

                if attempt > max_retries {
                    tracing::error!(
                        "Failed to connect to Redis after {} attempts: {}",
                        max_retries + 1,
                        e
                    );
                    return Err(e);
                }

                let delay = base_delay * 2_u32.pow(attempt.saturating_sub(1));

                tracing::warn!(
                    "Redis connection attempt {} failed: {}. Retrying in {:?}...",
                    attempt,
                    e,
                    delay
                );

                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Attempt to create a Redis pool (single try)
#[cfg(feature = "cache")]
async fn try_create_pool(config: &RedisConfig) -> Result<Pool> {
    let cfg = DeadpoolConfig::from_url(&config.url);

    let pool = cfg
        .builder()
        .map_err(|e| crate::error::Error::Internal(format!("Failed to build Redis pool: {}", e)))?
        .max_size(config.max_connections)
        .runtime(Runtime::Tokio1)
        .build()
        .map_err(|e| crate::error::Error::Internal(format!("Failed to create Redis pool: {}", e)))?;

    // Test the connection
    let conn = pool
        .get()
        .await
        .map_err(|e| crate::error::Error::Internal(format!("Failed to get Redis connection: {}", e)))?;
    drop(conn);

    Ok(pool)
}

/// HashMap-backed store for unit tests; expiry is recorded but not enforced
#[cfg(test)]
#[derive(Default)]
pub(crate) struct MemoryCache {
    entries: std::sync::Mutex<std::collections::HashMap<String, (String, Duration)>>,
    failing: std::sync::atomic::AtomicBool,
}

#[cfg(test)]
impl MemoryCache {
    pub fn failing() -> Self {
        let cache = Self::default();
        cache
            .failing
            .store(true, std::sync::atomic::Ordering::SeqCst);
        cache
    }

    pub fn insert(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), (value.to_string(), Duration::from_secs(3600)));
    }

    pub fn value(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).map(|(v, _)| v.clone())
    }

    pub fn ttl(&self, key: &str) -> Option<Duration> {
        self.entries.lock().unwrap().get(key).map(|(_, ttl)| *ttl)
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(crate::error::Error::Internal("cache unavailable".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.check()?;
        Ok(self.value(key))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        self.check()?;
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), (value.to_string(), ttl));
        Ok(())
    }

    async fn unset(&self, key: &str) -> Result<()> {
        self.check()?;
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cache_keys() {
        let keys = CacheKeys::new("things");
        assert_eq!(keys.all(), "things:all");
        assert_eq!(keys.one(42), "things:42");
    }

    #[tokio::test]
    async fn test_set_wraps_in_data_envelope() {
        let store = Arc::new(MemoryCache::default());
        let cache = ResponseCache::new(store.clone(), Duration::from_secs(3600));
        cache.set("things:1", &json!({"id": 1})).await;
        assert_eq!(store.value("things:1").unwrap(), r#"{"data":{"id":1}}"#);
        assert_eq!(store.ttl("things:1"), Some(Duration::from_secs(3600)));
        assert_eq!(
            cache.get("things:1").await.as_deref(),
            Some(r#"{"data":{"id":1}}"#)
        );
    }

    #[tokio::test]
    async fn test_unset_removes_entry() {
        let store = Arc::new(MemoryCache::default());
        let cache = ResponseCache::new(store.clone(), Duration::from_secs(60));
        cache.set("things:all", &vec![1, 2]).await;
        cache.unset("things:all").await;
        assert!(cache.get("things:all").await.is_none());
    }

    #[tokio::test]
    async fn test_store_failures_are_swallowed() {
        let cache = ResponseCache::new(Arc::new(MemoryCache::failing()), Duration::from_secs(60));
        cache.set("things:1", &1).await;
        cache.unset("things:1").await;
        assert!(cache.get("things:1").await.is_none());
    }

    #[tokio::test]
    async fn test_disabled_cache() {
        let cache = ResponseCache::disabled();
        assert!(!cache.is_enabled());
        cache.set("things:1", &1).await;
        assert!(cache.get("things:1").await.is_none());
    }
}

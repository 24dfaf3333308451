//! Application state management
//!
//! [`AppState`] bundles what the CRUD handlers share: configuration, the
//! PostgreSQL pool, the response cache and the message catalog. Build it
//! with [`AppStateBuilder`], which connects the backends named in the
//! configuration and degrades optional ones to "absent" with a warning.

use std::sync::Arc;

use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool};

use crate::cache::{CacheStore, ResponseCache};
use crate::config::Config;
use crate::error::Result;
use crate::i18n::{Localizer, MessageCatalog};
use crate::repository::{PgRepository, Record};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    db_pool: Option<PgPool>,
    cache: ResponseCache,
    localizer: Option<Arc<dyn Localizer>>,
}

impl AppState {
    /// State with no backends connected
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
            db_pool: None,
            cache: ResponseCache::disabled(),
            localizer: None,
        }
    }

    pub fn builder() -> AppStateBuilder {
        AppStateBuilder::new()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The database pool, if connected
    pub fn db(&self) -> Option<&PgPool> {
        self.db_pool.as_ref()
    }

    /// Generic repository for `T` over the shared pool
    pub fn repository<T>(&self) -> Option<PgRepository<T>>
    where
        T: Record + Serialize + for<'r> FromRow<'r, PgRow>,
    {
        self.db_pool.clone().map(PgRepository::new)
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub fn localizer(&self) -> Option<Arc<dyn Localizer>> {
        self.localizer.clone()
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("service", &self.config.service.name)
            .field("database", &self.db_pool.is_some())
            .field("cache", &self.cache)
            .field("localizer", &self.localizer.is_some())
            .finish()
    }
}

/// Builder connecting the configured backends
pub struct AppStateBuilder {
    config: Option<Config>,
    enable_tracing: bool,
    db_pool: Option<PgPool>,
    cache_store: Option<Arc<dyn CacheStore>>,
    localizer: Option<Arc<dyn Localizer>>,
}

impl AppStateBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            enable_tracing: true,
            db_pool: None,
            cache_store: None,
            localizer: None,
        }
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Use an existing pool instead of connecting from `config.database`
    pub fn db_pool(mut self, pool: PgPool) -> Self {
        self.db_pool = Some(pool);
        self
    }

    /// Use an existing cache store instead of connecting from `config.redis`
    pub fn cache_store(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.cache_store = Some(store);
        self
    }

    /// Use an existing localizer instead of loading `config.i18n.catalog_dir`
    pub fn localizer(mut self, localizer: Arc<dyn Localizer>) -> Self {
        self.localizer = Some(localizer);
        self
    }

    pub fn with_tracing(mut self) -> Self {
        self.enable_tracing = true;
        self
    }

    pub fn without_tracing(mut self) -> Self {
        self.enable_tracing = false;
        self
    }

    pub async fn build(self) -> Result<AppState> {
        let config = self.config.unwrap_or_default();

        if self.enable_tracing {
            crate::observability::init_tracing(&config)?;
        }

        let db_pool = match self.db_pool {
            Some(pool) => Some(pool),
            None => connect_database(&config).await?,
        };

        let cache = if !config.cache.enabled {
            tracing::info!("Response cache disabled by configuration");
            ResponseCache::disabled()
        } else {
            let store = match self.cache_store {
                Some(store) => Some(store),
                None => connect_cache(&config).await?,
            };
            match store {
                Some(store) => ResponseCache::new(store, config.cache.ttl()),
                None => ResponseCache::disabled(),
            }
        };

        let localizer = match self.localizer {
            Some(localizer) => Some(localizer),
            None => load_catalog(&config),
        };

        Ok(AppState {
            config: Arc::new(config),
            db_pool,
            cache,
            localizer,
        })
    }
}

impl Default for AppStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

async fn connect_database(config: &Config) -> Result<Option<PgPool>> {
    let Some(db_config) = &config.database else {
        return Ok(None);
    };
    match crate::database::create_pool(db_config).await {
        Ok(pool) => Ok(Some(pool)),
        Err(e) if db_config.optional => {
            tracing::warn!(
                "Optional database connection failed: {}. Service starting without database.",
                e
            );
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

#[cfg(feature = "cache")]
async fn connect_cache(config: &Config) -> Result<Option<Arc<dyn CacheStore>>> {
    let Some(redis_config) = &config.redis else {
        return Ok(None);
    };
    match crate::cache::create_pool(redis_config).await {
        Ok(pool) => Ok(Some(Arc::new(crate::cache::RedisCache::new(pool)))),
        Err(e) if redis_config.optional => {
            tracing::warn!(
                "Optional Redis connection failed: {}. Service starting without cache.",
                e
            );
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

#[cfg(not(feature = "cache"))]
async fn connect_cache(config: &Config) -> Result<Option<Arc<dyn CacheStore>>> {
    if config.redis.is_some() {
        tracing::warn!("Redis configured but the `cache` feature is disabled");
    }
    Ok(None)
}

fn load_catalog(config: &Config) -> Option<Arc<dyn Localizer>> {
    let dir = config.i18n.catalog_dir.as_ref()?;
    match MessageCatalog::load_dir(dir, &config.i18n.default_locale) {
        Ok(catalog) => {
            tracing::info!("Message catalogs loaded from {}", dir.display());
            Some(Arc::new(catalog))
        }
        Err(e) => {
            tracing::warn!(
                "Failed to load message catalogs from {}: {}. Messages fall back to \"error\".",
                dir.display(),
                e
            );
            None
        }
    }
}

//! # crudkit
//!
//! Generic CRUD data-access layer over PostgreSQL, with cached REST handlers.
//!
//! Any number of record types share one implementation of listing, fetching,
//! creating, updating, soft-deleting and restoring rows. Callers filter,
//! join, order and paginate through query parameters without writing
//! per-resource SQL.
//!
//! ## Layers
//!
//! - **[`repository`]**: [`Record`](repository::Record) describes a table;
//!   [`PgRepository`](repository::PgRepository) implements
//!   [`CrudRepository`](repository::CrudRepository) on top of `sqlx`, driven by
//!   [`Pager`](repository::Pager), [`OrderFilter`](repository::OrderFilter),
//!   [`Searcher`](repository::Searcher) and composable [`Scope`](repository::Scope)s.
//! - **[`service`]**: capability traits and the pass-through
//!   [`CrudService`](service::CrudService).
//! - **[`handlers`]**: [`CrudTemplate`](handlers::CrudTemplate) mounts the six
//!   REST routes on an axum router, with Redis response caching and localized
//!   error envelopes.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use crudkit::prelude::*;
//!
//! #[derive(Debug, Clone, Default, Serialize, Deserialize, sqlx::FromRow)]
//! #[serde(default)]
//! struct Permission {
//!     id: i64,
//!     id_role: i64,
//!     target: String,
//!     deleted_at: Option<DateTime<Utc>>,
//! }
//!
//! impl Record for Permission {
//!     const TABLE: &'static str = "permissions";
//!     const COLUMNS: &'static [&'static str] = &["id", "id_role", "target", "deleted_at"];
//!     const DELETED_AT: Option<&'static str> = Some("deleted_at");
//!
//!     fn id(&self) -> RecordId {
//!         self.id
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::load()?;
//!     init_tracing(&config)?;
//!
//!     let state = AppState::builder()
//!         .config(config.clone())
//!         .without_tracing()
//!         .build()
//!         .await?;
//!
//!     let repository = state
//!         .repository::<Permission>()
//!         .ok_or_else(|| Error::Internal("database is not configured".to_string()))?;
//!     let permissions =
//!         CrudTemplate::from_state(&state, Arc::new(CrudService::new(repository)), "permissions");
//!
//!     let app = Router::new().nest("/permissions", permissions.router());
//!
//!     Server::new(config).serve(app).await
//! }
//! ```

pub mod cache;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod i18n;
pub mod observability;
pub mod repository;
pub mod server;
pub mod service;
pub mod state;
pub mod types;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cache::{CacheKeys, CacheStore, ResponseCache};

    #[cfg(feature = "cache")]
    pub use crate::cache::RedisCache;

    pub use crate::config::{CacheConfig, Config, DatabaseConfig, I18nConfig, RedisConfig};
    pub use crate::database::{drop_constraints, ensure_unique_constraint, has_constraint};
    pub use crate::error::{DatabaseError, DatabaseErrorKind, DatabaseOperation, Error, Result};
    pub use crate::handlers::{AppError, CrudTemplate, ErrorKind, LanguageId, QueryParams};
    pub use crate::i18n::{localize, Localizer, MessageCatalog};
    pub use crate::observability::init_tracing;
    pub use crate::repository::{
        Changeset, CrudRepository, FieldCoercion, Fragment, OrderDirection, OrderFilter, Page,
        Pager, PgRepository, Record, RecordId, Relation, RepositoryError, RepositoryErrorKind,
        RepositoryOperation, RepositoryResult, Scope, Searcher, SqlValue,
    };
    pub use crate::server::Server;
    pub use crate::service::{
        CrudService, DeleteRecord, ListDeletedRecords, ListRecords, ReadRecord, RecordService,
        WriteRecord,
    };
    pub use crate::state::{AppState, AppStateBuilder};
    pub use crate::types::PhoneNumber;

    pub use axum::{
        extract::{Path, Query, State},
        http::{HeaderMap, StatusCode},
        response::{IntoResponse, Json, Response},
        routing::{delete, get, patch, post, put},
        Extension, Router,
    };

    pub use serde::{Deserialize, Serialize};

    // Re-export tracing macros
    pub use tracing::{debug, error, info, instrument, trace, warn};

    // Re-export time utilities
    pub use chrono::{DateTime, NaiveDate, Utc};

    pub use async_trait::async_trait;
}

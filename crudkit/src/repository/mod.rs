//! Generic repository for PostgreSQL-backed records
//!
//! This module provides the data-access core: one generic implementation of
//! listing, fetching, creating, updating, soft-deleting, restoring and
//! upserting that any [`Record`] type can use without per-resource SQL.
//!
//! # Features
//!
//! - **Dynamic search**: [`Searcher`] turns a client JSON object into bound predicates and joins
//! - **Ordering**: [`OrderFilter`] validates `order_by` terms against the record's columns
//! - **Pagination**: [`Pager`] clamps page and page size at the request boundary
//! - **Scopes**: [`Scope`] composes named query transformations
//! - **Soft delete**: deletion timestamps with restore via [`CrudRepository::recover`]
//! - **Upsert**: [`CrudRepository::create_or_update`] on a named unique constraint
//!
//! # Example
//!
//! ```rust,ignore
//! use crudkit::repository::{CrudRepository, OrderFilter, Pager, PgRepository, Scope, Searcher};
//!
//! let repo = PgRepository::<Permission>::new(pool);
//! let page = repo
//!     .find_all(
//!         &Pager::from_params(Some(1), Some(20)),
//!         &OrderFilter::new::<Permission>(&["-id"]),
//!         &Scope::none(),
//!         Searcher::parse::<Permission>(r#"{"target": "users"}"#).as_ref(),
//!     )
//!     .await?;
//! ```

mod changeset;
mod error;
#[cfg(test)]
pub(crate) mod memory;
mod order;
mod pager;
mod postgres;
mod query;
mod record;
mod scope;
mod searcher;
mod sql;
mod traits;

// Re-export all public types
pub use changeset::Changeset;
pub use error::{RepositoryError, RepositoryErrorKind, RepositoryOperation, RepositoryResult};
pub use order::{OrderDirection, OrderFilter};
pub use pager::{Pager, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
pub use postgres::{FilteredQuery, PgRepository};
pub use query::{SelectQuery, Visibility};
pub use record::{is_identifier, table_name_for, to_snake_case, FieldCoercion, Record, RecordId, Relation};
pub use scope::Scope;
pub use searcher::{is_strict_date, Condition, JoinClause, Searcher, NOT_NULL};
pub use sql::{Fragment, SqlValue};
pub use traits::{CrudRepository, Page};

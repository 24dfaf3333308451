//! HTTP surface of the CRUD layer
//!
//! [`CrudTemplate`] mounts list, detail, create, update and delete routes for
//! one record type on an axum [`Router`](axum::Router). Failures use the
//! [`AppError`] envelope; successful reads are cached through
//! [`ResponseCache`](crate::cache::ResponseCache).
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use axum::Router;
//! use crudkit::handlers::CrudTemplate;
//! use crudkit::repository::PgRepository;
//! use crudkit::service::CrudService;
//!
//! let things = CrudTemplate::from_state(
//!     &state,
//!     Arc::new(CrudService::new(PgRepository::<Thing>::new(pool))),
//!     "things",
//! );
//! let app = Router::new().nest("/things", things.router());
//! ```

mod error;
mod query;
mod template;

pub use error::{field_name_from_detail, AppError, ErrorKind};
pub use query::QueryParams;
pub use template::{CrudTemplate, LanguageId};

//! Named, composable query transformations
//!
//! A [`Scope`] maps a [`SelectQuery`] to a new one. Repositories thread a
//! caller-supplied scope through every read, and [`Pager`](super::Pager)
//! and [`OrderFilter`](super::OrderFilter) express pagination and ordering
//! as scopes too. Scopes hold no state of their own and are cheap to clone.
//!
//! # Example
//!
//! ```rust
//! use crudkit::repository::{Fragment, Scope, SelectQuery};
//!
//! let tenant = Scope::filter("tenant", {
//!     let mut f = Fragment::sql("things.tenant_id = ");
//!     f.push_value(7i64);
//!     f
//! });
//! let visible = Scope::filter("visible", Fragment::sql("things.hidden = false"));
//! let scope = tenant.then(visible);
//!
//! assert_eq!(scope.name(), "tenant+visible");
//! let query = scope.apply(SelectQuery::new("things", None));
//! assert_eq!(
//!     query.to_select().sql(),
//!     "SELECT things.* FROM things WHERE (things.tenant_id = $1) AND (things.hidden = false)"
//! );
//! ```

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use super::query::{SelectQuery, Visibility};
use super::sql::Fragment;

type Transform = dyn Fn(SelectQuery) -> SelectQuery + Send + Sync;

/// A named query transformation
#[derive(Clone)]
pub struct Scope {
    name: Cow<'static, str>,
    transform: Option<Arc<Transform>>,
}

impl Scope {
    /// Scope from a transformation function
    pub fn new<F>(name: impl Into<Cow<'static, str>>, transform: F) -> Self
    where
        F: Fn(SelectQuery) -> SelectQuery + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            transform: Some(Arc::new(transform)),
        }
    }

    /// The identity scope
    pub fn none() -> Self {
        Self {
            name: Cow::Borrowed("none"),
            transform: None,
        }
    }

    /// Scope adding one predicate
    pub fn filter(name: impl Into<Cow<'static, str>>, predicate: Fragment) -> Self {
        Self::new(name, move |query| query.filter(predicate.clone()))
    }

    /// Scope lifting soft-delete filtering
    pub fn unscoped() -> Self {
        Self::new("unscoped", |query| query.with_visibility(Visibility::All))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_identity(&self) -> bool {
        self.transform.is_none()
    }

    /// Run `self`, then `next`
    #[must_use]
    pub fn then(self, next: Scope) -> Scope {
        match (&self.transform, &next.transform) {
            (None, _) => next,
            (_, None) => self,
            (Some(first), Some(second)) => {
                let first = Arc::clone(first);
                let second = Arc::clone(second);
                Scope {
                    name: Cow::Owned(format!("{}+{}", self.name, next.name)),
                    transform: Some(Arc::new(move |query| second(first(query)))),
                }
            }
        }
    }

    /// Apply the transformation
    pub fn apply(&self, query: SelectQuery) -> SelectQuery {
        match &self.transform {
            Some(transform) => transform(query),
            None => query,
        }
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::none()
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope").field("name", &self.name).finish()
    }
}

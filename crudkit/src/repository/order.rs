//! Client-requested ordering
//!
//! [`OrderFilter`] turns raw `order_by` values into validated ORDER BY terms.
//! Field names are normalized to snake_case, a leading `-` selects descending
//! order for that field, and anything that is not a column of the record is
//! dropped without error.
//!
//! # Example
//!
//! ```rust
//! use crudkit::repository::{OrderDirection, OrderFilter};
//!
//! let order = OrderFilter::from_columns(
//!     &["-createdAt", "bogus", "name"],
//!     &["id", "name", "created_at"],
//! );
//! assert_eq!(
//!     order.terms(),
//!     &[
//!         ("created_at".to_string(), OrderDirection::Descending),
//!         ("name".to_string(), OrderDirection::Ascending),
//!     ]
//! );
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use super::record::{to_snake_case, Record};
use super::scope::Scope;

/// Direction for ordering query results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OrderDirection {
    /// Ascending order (A-Z, 0-9, oldest first)
    #[default]
    #[serde(rename = "asc")]
    Ascending,
    /// Descending order (Z-A, 9-0, newest first)
    #[serde(rename = "desc")]
    Descending,
}

impl OrderDirection {
    /// SQL keyword for this direction
    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            Self::Ascending => "ASC",
            Self::Descending => "DESC",
        }
    }
}

impl fmt::Display for OrderDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ascending => write!(f, "asc"),
            Self::Descending => write!(f, "desc"),
        }
    }
}

/// Validated ORDER BY terms
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderFilter {
    terms: Vec<(String, OrderDirection)>,
}

impl OrderFilter {
    /// Build from raw field names, keeping only columns of `T`
    pub fn new<T: Record>(raw: &[impl AsRef<str>]) -> Self {
        Self::from_columns(raw, T::COLUMNS)
    }

    /// Build from raw field names, keeping only entries of `columns`
    pub fn from_columns(raw: &[impl AsRef<str>], columns: &[&str]) -> Self {
        let terms = raw
            .iter()
            .filter_map(|value| {
                let attribute = to_snake_case(value.as_ref().trim());
                let (column, direction) = match attribute.strip_prefix('-') {
                    Some(rest) => (rest.to_string(), OrderDirection::Descending),
                    None => (attribute, OrderDirection::Ascending),
                };
                if columns.contains(&column.as_str()) {
                    Some((column, direction))
                } else {
                    tracing::debug!(column = %column, "dropping unknown order column");
                    None
                }
            })
            .collect();
        Self { terms }
    }

    pub fn terms(&self) -> &[(String, OrderDirection)] {
        &self.terms
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Scope applying the ORDER BY; identity when empty
    pub fn sort(&self) -> Scope {
        if self.terms.is_empty() {
            return Scope::none();
        }
        let terms = self.terms.clone();
        Scope::new("order", move |mut query| {
            for (column, direction) in &terms {
                query = query.order_by(column.clone(), *direction);
            }
            query
        })
    }
}

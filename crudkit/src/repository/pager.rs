//! Page-based pagination
//!
//! The [`Pager`] itself trusts its inputs; clamping happens at the request
//! boundary in [`Pager::from_params`].
//!
//! # Example
//!
//! ```rust
//! use crudkit::repository::Pager;
//!
//! let pager = Pager::from_params(Some(3), Some(250));
//! assert_eq!(pager.page(), 3);
//! assert_eq!(pager.page_size(), 100);
//! assert_eq!(pager.offset(), 200);
//! ```

use super::scope::Scope;

/// Page size used when the request gives none or a non-positive one
pub const DEFAULT_PAGE_SIZE: i64 = 10;

/// Largest page size a request may ask for
pub const MAX_PAGE_SIZE: i64 = 100;

/// Immutable page window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pager {
    page: i64,
    page_size: i64,
    offset: i64,
}

impl Pager {
    /// Pager from already-validated values
    pub fn new(page: i64, page_size: i64, offset: i64) -> Self {
        Self {
            page,
            page_size,
            offset,
        }
    }

    /// Pager from raw request values
    ///
    /// A missing or non-positive page becomes 1. A page size above
    /// [`MAX_PAGE_SIZE`] is clamped to it; a missing or non-positive one
    /// becomes [`DEFAULT_PAGE_SIZE`].
    pub fn from_params(page: Option<i64>, page_size: Option<i64>) -> Self {
        let page = match page {
            Some(p) if p >= 1 => p,
            _ => 1,
        };
        let page_size = match page_size {
            Some(s) if s > MAX_PAGE_SIZE => MAX_PAGE_SIZE,
            Some(s) if s >= 1 => s,
            _ => DEFAULT_PAGE_SIZE,
        };
        Self::new(page, page_size, (page - 1).saturating_mul(page_size))
    }

    pub fn page(&self) -> i64 {
        self.page
    }

    pub fn page_size(&self) -> i64 {
        self.page_size
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }

    /// Scope applying `LIMIT page_size OFFSET offset`
    pub fn paginate(&self) -> Scope {
        let Self {
            page_size, offset, ..
        } = *self;
        Scope::new("paginate", move |query| query.offset(offset).limit(page_size))
    }
}

impl Default for Pager {
    fn default() -> Self {
        Self::from_params(None, None)
    }
}

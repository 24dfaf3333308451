//! Query string parameters of the CRUD endpoints
//!
//! Parsed from the raw query so that `order_by` can repeat:
//! `?page=2&page_size=20&order_by=name&order_by=-createdAt&search={"active":true}`.
//! Malformed numbers are treated as absent and clamped by [`Pager::from_params`].

use crate::repository::{OrderFilter, Pager, Record, Searcher};

/// Parameters shared by the list and detail endpoints
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    /// Raw sort fields in request order
    pub order_by: Vec<String>,
    /// JSON search object
    pub search: Option<String>,
    /// Bypass the response cache on reads
    pub redis_stop: bool,
}

impl QueryParams {
    pub fn parse(query: Option<&str>) -> Self {
        let mut params = Self::default();
        let Some(query) = query else {
            return params;
        };
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "page" => params.page = value.trim().parse().ok(),
                "page_size" => params.page_size = value.trim().parse().ok(),
                "order_by" => params.order_by.push(value.into_owned()),
                "search" if !value.is_empty() => params.search = Some(value.into_owned()),
                "redisStop" => params.redis_stop = !value.is_empty(),
                _ => {}
            }
        }
        params
    }

    pub fn pager(&self) -> Pager {
        Pager::from_params(self.page, self.page_size)
    }

    pub fn order<T: Record>(&self) -> OrderFilter {
        OrderFilter::new::<T>(&self.order_by)
    }

    pub fn searcher<T: Record>(&self) -> Option<Searcher> {
        self.search.as_deref().and_then(Searcher::parse::<T>)
    }
}

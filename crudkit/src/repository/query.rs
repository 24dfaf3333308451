//! Select query model
//!
//! [`SelectQuery`] is the value every [`Scope`](super::Scope) transforms. It
//! collects predicates, joins, ordering and pagination for one table and
//! renders them into `sqlx::QueryBuilder`s for the fetch and count
//! round-trips. Identifiers are taken from the record's static schema;
//! values are always bound.

use sqlx::{Postgres, QueryBuilder};

use super::order::OrderDirection;
use super::searcher::JoinClause;
use super::sql::Fragment;

/// Which rows a query sees with respect to soft delete
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    /// Rows whose deletion timestamp is null
    #[default]
    Active,
    /// Rows whose deletion timestamp is set
    Deleted,
    /// Every row
    All,
}

/// A single-table select under construction
#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    table: &'static str,
    deleted_at: Option<&'static str>,
    visibility: Visibility,
    predicates: Vec<Fragment>,
    joins: Vec<JoinClause>,
    order_by: Vec<(String, OrderDirection)>,
    limit: Option<i64>,
    offset: Option<i64>,
}

impl SelectQuery {
    /// Query over `table`; `deleted_at` enables soft-delete filtering
    pub fn new(table: &'static str, deleted_at: Option<&'static str>) -> Self {
        Self {
            table,
            deleted_at,
            visibility: Visibility::Active,
            predicates: Vec::new(),
            joins: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    pub fn table(&self) -> &'static str {
        self.table
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    /// Add a predicate, combined with the others by AND
    #[must_use]
    pub fn filter(mut self, predicate: Fragment) -> Self {
        if !predicate.is_empty() {
            self.predicates.push(predicate);
        }
        self
    }

    /// Add a join clause
    #[must_use]
    pub fn join(mut self, join: JoinClause) -> Self {
        if !self.joins.contains(&join) {
            self.joins.push(join);
        }
        self
    }

    /// Append an ORDER BY term on a column of this table
    #[must_use]
    pub fn order_by(mut self, column: impl Into<String>, direction: OrderDirection) -> Self {
        self.order_by.push((column.into(), direction));
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Change soft-delete visibility
    #[must_use]
    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Restrict to `id_column = id`
    #[must_use]
    pub fn by_id(self, id_column: &str, id: i64) -> Self {
        let mut predicate = Fragment::sql(format!("{}.{} = ", self.table, id_column));
        predicate.push_value(id);
        self.filter(predicate)
    }

    /// `SELECT table.* FROM ...` with ordering and pagination
    pub fn to_select(&self) -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::new(format!("SELECT {}.* FROM {}", self.table, self.table));
        self.push_joins_and_where(&mut qb);

        if !self.order_by.is_empty() {
            qb.push(" ORDER BY ");
            let terms: Vec<String> = self
                .order_by
                .iter()
                .map(|(column, direction)| format!("{}.{} {}", self.table, column, direction.as_sql()))
                .collect();
            qb.push(terms.join(", "));
        }
        if let Some(limit) = self.limit {
            qb.push(format!(" LIMIT {}", limit));
        }
        if let Some(offset) = self.offset {
            qb.push(format!(" OFFSET {}", offset));
        }
        qb
    }

    /// `SELECT COUNT(*) FROM ...` ignoring ordering and pagination
    pub fn to_count(&self) -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::new(format!("SELECT COUNT(*) FROM {}", self.table));
        self.push_joins_and_where(&mut qb);
        qb
    }

    fn push_joins_and_where(&self, qb: &mut QueryBuilder<'static, Postgres>) {
        for join in &self.joins {
            qb.push(" ");
            qb.push(join.to_sql(self.table));
        }

        let mut conditions: Vec<Fragment> = Vec::new();
        if let Some(column) = self.deleted_at {
            match self.visibility {
                Visibility::Active => {
                    conditions.push(Fragment::sql(format!("{}.{} IS NULL", self.table, column)))
                }
                Visibility::Deleted => conditions.push(Fragment::sql(format!(
                    "{}.{} IS NOT NULL",
                    self.table, column
                ))),
                Visibility::All => {}
            }
        }
        conditions.extend(self.predicates.iter().cloned());

        let mut first = true;
        for condition in conditions {
            qb.push(if first { " WHERE (" } else { " AND (" });
            condition.push_to(qb);
            qb.push(")");
            first = false;
        }
    }
}

//! Dynamic search predicates
//!
//! A client sends a JSON object in the `search` query parameter. Each
//! key/value pair becomes one predicate, classified by the value's type,
//! and all predicates are combined with `and`. A nested object names one of
//! the record's [`Relation`]s and turns its own pairs into predicates on the
//! joined table.
//!
//! Values are classified by a fixed dispatch order:
//!
//! | # | Value | Predicate |
//! |---|-------|-----------|
//! | 1 | boolean | `col = $v` |
//! | 2 | number | `col = $v` |
//! | 3 | `YYYY-MM-DD` string | `col::text LIKE '%v%'` |
//! | 4 | `"<date> and <x>"` string | `col BETWEEN a AND b` |
//! | 5 | `"not_null"` | `col IS NOT NULL` |
//! | 6 | `"<lang> = <word>"` under a key containing `json` | `col ->> lang ILIKE '%word%'` |
//! | 7 | any other string | `col ILIKE '%v%'` |
//!
//! A string containing `" and "` whose first half is not a date skips row 4
//! and ends up in row 7 unchanged. Keys that are not columns of the record
//! (or of the relation) are dropped. Input that is not a JSON object, or that
//! yields no predicate, produces no searcher at all so listing proceeds
//! unfiltered.
//!
//! Column names come from the record's static schema and every value is a
//! bound parameter.
//!
//! # Example
//!
//! ```rust
//! use crudkit::repository::{Record, RecordId, Searcher};
//!
//! struct Thing;
//!
//! impl Record for Thing {
//!     const TABLE: &'static str = "things";
//!     const COLUMNS: &'static [&'static str] = &["id", "name", "active"];
//!
//!     fn id(&self) -> RecordId {
//!         0
//!     }
//! }
//!
//! let searcher = Searcher::parse::<Thing>(r#"{"active": true, "name": "ann"}"#).unwrap();
//! assert_eq!(
//!     searcher.predicate().to_string(),
//!     "things.active = true and things.name ILIKE '%ann%'"
//! );
//! assert!(Searcher::parse::<Thing>("not json").is_none());
//! ```

use chrono::NaiveDate;
use serde_json::Value;

use super::record::{Record, Relation};
use super::scope::Scope;
use super::sql::{Fragment, SqlValue};

/// Sentinel string selecting `IS NOT NULL`
pub const NOT_NULL: &str = "not_null";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Whether `value` is exactly a `YYYY-MM-DD` date
pub fn is_strict_date(value: &str) -> bool {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map(|date| date.format(DATE_FORMAT).to_string() == value)
        .unwrap_or(false)
}

/// A `LEFT JOIN` onto one relation of the root table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinClause {
    pub alias: &'static str,
    pub table: &'static str,
    pub local_key: &'static str,
    pub foreign_key: &'static str,
    pub deleted_at: Option<&'static str>,
}

impl JoinClause {
    /// SQL for joining onto `root`
    pub fn to_sql(&self, root: &str) -> String {
        let mut sql = format!(
            "LEFT JOIN {} AS {} ON {}.{} = {}.{}",
            self.table, self.alias, self.alias, self.foreign_key, root, self.local_key
        );
        if let Some(column) = self.deleted_at {
            sql.push_str(&format!(" AND {}.{} IS NULL", self.alias, column));
        }
        sql
    }
}

impl From<&Relation> for JoinClause {
    fn from(relation: &Relation) -> Self {
        Self {
            alias: relation.name,
            table: relation.table,
            local_key: relation.local_key,
            foreign_key: relation.foreign_key,
            deleted_at: relation.deleted_at,
        }
    }
}

/// The comparison inferred for one search value
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Boolean or numeric equality
    Equals(SqlValue),
    /// Substring match on the column's text form
    Date(String),
    /// Inclusive date range
    DateRange(String, String),
    /// `IS NOT NULL`
    NotNull,
    /// Substring match on one key of a JSON column
    JsonPath { lang: String, word: String },
    /// Case-insensitive substring match
    Contains(String),
}

impl Condition {
    /// Classify a search value; `None` for nulls, arrays and objects
    pub fn classify(key: &str, value: &Value) -> Option<Self> {
        match value {
            Value::Bool(_) | Value::Number(_) => Some(Self::Equals(SqlValue::from_json(value))),
            Value::String(s) => Some(Self::classify_str(key, s)),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    fn classify_str(key: &str, value: &str) -> Self {
        if is_strict_date(value) {
            return Self::Date(value.to_string());
        }

        let mut halves = value.split(" and ");
        if let (Some(from), Some(to)) = (halves.next(), halves.next()) {
            if is_strict_date(from) {
                return Self::DateRange(from.to_string(), to.to_string());
            }
        }

        if value == NOT_NULL {
            return Self::NotNull;
        }

        if key.contains("json") {
            if let Some((lang, word)) = value.split_once(" = ") {
                return Self::JsonPath {
                    lang: lang.to_string(),
                    word: word.to_string(),
                };
            }
        }

        Self::Contains(value.to_string())
    }

    /// Predicate on an already-qualified column
    pub fn to_fragment(&self, column: &str) -> Fragment {
        let mut fragment = Fragment::new();
        match self {
            Self::Equals(value) => {
                fragment.push_sql(format!("{} = ", column)).push_value(value.clone());
            }
            Self::Date(date) => {
                fragment
                    .push_sql(format!("{}::text LIKE ", column))
                    .push_value(format!("%{}%", date));
            }
            Self::DateRange(from, to) => {
                fragment
                    .push_sql(format!("{} BETWEEN ", column))
                    .push_value(from.clone())
                    .push_sql("::date AND ")
                    .push_value(to.clone())
                    .push_sql("::date");
            }
            Self::NotNull => {
                fragment.push_sql(format!("{} IS NOT NULL", column));
            }
            Self::JsonPath { lang, word } => {
                fragment
                    .push_sql(format!("{} ->> ", column))
                    .push_value(lang.clone())
                    .push_sql(" ILIKE ")
                    .push_value(format!("%{}%", word));
            }
            Self::Contains(text) => {
                fragment
                    .push_sql(format!("{} ILIKE ", column))
                    .push_value(format!("%{}%", text));
            }
        }
        fragment
    }
}

/// A parsed search: one predicate and at most one join
#[derive(Debug, Clone, PartialEq)]
pub struct Searcher {
    predicate: Fragment,
    join: Option<JoinClause>,
}

impl Searcher {
    /// Parse the raw `search` parameter for record type `T`
    pub fn parse<T: Record>(raw: &str) -> Option<Self> {
        if raw.trim().is_empty() {
            return None;
        }
        match serde_json::from_str::<Value>(raw) {
            Ok(value) => Self::from_value::<T>(&value),
            Err(e) => {
                tracing::debug!(error = %e, "ignoring malformed search parameter");
                None
            }
        }
    }

    /// Build from an already-decoded search object
    ///
    /// When several keys name relations, the last one decides the join while
    /// the predicates of all of them are kept.
    pub fn from_value<T: Record>(value: &Value) -> Option<Self> {
        let object = value.as_object()?;

        let mut fragments = Vec::new();
        let mut join = None;

        for (key, value) in object {
            if let Value::Object(inner) = value {
                let Some(relation) = T::relation(key) else {
                    tracing::debug!(relation = %key, table = T::TABLE, "dropping unknown search relation");
                    continue;
                };
                join = Some(JoinClause::from(relation));
                for (inner_key, inner_value) in inner {
                    if !relation.has_column(inner_key) {
                        tracing::debug!(column = %inner_key, relation = relation.name, "dropping unknown search column");
                        continue;
                    }
                    if let Some(condition) = Condition::classify(inner_key, inner_value) {
                        fragments.push(
                            condition.to_fragment(&format!("{}.{}", relation.name, inner_key)),
                        );
                    }
                }
                continue;
            }

            if !T::has_column(key) {
                tracing::debug!(column = %key, table = T::TABLE, "dropping unknown search column");
                continue;
            }
            if let Some(condition) = Condition::classify(key, value) {
                fragments.push(condition.to_fragment(&format!("{}.{}", T::TABLE, key)));
            }
        }

        let predicate = Fragment::and_all(fragments)?;
        Some(Self { predicate, join })
    }

    pub fn predicate(&self) -> &Fragment {
        &self.predicate
    }

    pub fn join(&self) -> Option<&JoinClause> {
        self.join.as_ref()
    }

    /// Scope adding the predicate and join clause
    pub fn scope(&self) -> Scope {
        let predicate = self.predicate.clone();
        let join = self.join.clone();
        Scope::new("search", move |query| {
            let query = match &join {
                Some(join) => query.join(join.clone()),
                None => query,
            };
            query.filter(predicate.clone())
        })
    }
}

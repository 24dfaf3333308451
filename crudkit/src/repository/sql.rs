//! SQL fragments with bound values
//!
//! A [`Fragment`] is an ordered list of SQL text and [`SqlValue`]s. When a
//! fragment is pushed into a `sqlx::QueryBuilder` every value becomes a `$n`
//! placeholder, so client data never lands in the SQL text. The `Display`
//! impl renders values inline as SQL literals and is meant for logs and
//! assertions only.

use std::fmt;

use sqlx::{Postgres, QueryBuilder};

use super::error::{RepositoryError, RepositoryOperation, RepositoryResult};

/// A value bound into a query
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Json(serde_json::Value),
}

impl SqlValue {
    /// Convert a scalar JSON value; objects and arrays stay JSON
    pub fn from_json(value: &serde_json::Value) -> Self {
        use serde_json::Value;

        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => Self::Text(s.clone()),
            other => Self::Json(other.clone()),
        }
    }

    pub(crate) fn push_to(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        match self {
            Self::Null => {
                qb.push("NULL");
            }
            Self::Bool(b) => {
                qb.push_bind(*b);
            }
            Self::Int(i) => {
                qb.push_bind(*i);
            }
            Self::Float(f) => {
                qb.push_bind(*f);
            }
            Self::Text(s) => {
                qb.push_bind(s.clone());
            }
            Self::Json(v) => {
                qb.push_bind(sqlx::types::Json(v.clone()));
            }
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(v) => write!(f, "{}", v),
            Self::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Self::Json(v) => write!(f, "'{}'", v.to_string().replace('\'', "''")),
        }
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for SqlValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Part {
    Sql(String),
    Value(SqlValue),
}

/// A piece of SQL with its bound values
///
/// # Example
///
/// ```rust
/// use crudkit::repository::Fragment;
///
/// let fragment = Fragment::with_values("target = ? and value > ?", vec!["users".into(), 2.into()])
///     .unwrap();
/// assert_eq!(fragment.to_string(), "target = 'users' and value > 2");
/// assert_eq!(fragment.value_count(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fragment {
    parts: Vec<Part>,
}

impl Fragment {
    /// Empty fragment
    pub fn new() -> Self {
        Self::default()
    }

    /// Fragment of trusted SQL text
    pub fn sql(sql: impl Into<String>) -> Self {
        let mut fragment = Self::new();
        fragment.push_sql(sql);
        fragment
    }

    /// Fragment from text with `?` placeholders, one per value
    ///
    /// `??` stands for a literal `?`, e.g. the jsonb key-exists operator:
    /// `data ?? 'ky' and id = ?` renders as `data ? 'ky' and id = $1`.
    pub fn with_values(sql: &str, values: Vec<SqlValue>) -> RepositoryResult<Self> {
        let mut pieces = vec![String::new()];
        let mut chars = sql.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '?' if chars.peek() == Some(&'?') => {
                    chars.next();
                    if let Some(piece) = pieces.last_mut() {
                        piece.push('?');
                    }
                }
                '?' => pieces.push(String::new()),
                c => {
                    if let Some(piece) = pieces.last_mut() {
                        piece.push(c);
                    }
                }
            }
        }
        if pieces.len() != values.len() + 1 {
            return Err(RepositoryError::validation_failed(
                RepositoryOperation::Raw,
                format!(
                    "expected {} bound values, got {}",
                    pieces.len() - 1,
                    values.len()
                ),
            ));
        }

        let mut fragment = Self::new();
        let mut values = values.into_iter();
        for (i, piece) in pieces.into_iter().enumerate() {
            if i > 0 {
                if let Some(value) = values.next() {
                    fragment.push_value(value);
                }
            }
            fragment.push_sql(piece);
        }
        Ok(fragment)
    }

    /// Append trusted SQL text
    pub fn push_sql(&mut self, sql: impl Into<String>) -> &mut Self {
        let sql = sql.into();
        if sql.is_empty() {
            return self;
        }
        match self.parts.last_mut() {
            Some(Part::Sql(last)) => last.push_str(&sql),
            _ => self.parts.push(Part::Sql(sql)),
        }
        self
    }

    /// Append a bound value
    pub fn push_value(&mut self, value: impl Into<SqlValue>) -> &mut Self {
        self.parts.push(Part::Value(value.into()));
        self
    }

    /// Append another fragment
    pub fn append(&mut self, other: Fragment) -> &mut Self {
        for part in other.parts {
            match part {
                Part::Sql(sql) => {
                    self.push_sql(sql);
                }
                Part::Value(value) => {
                    self.parts.push(Part::Value(value));
                }
            }
        }
        self
    }

    /// Join fragments with `" and "`; `None` when there are none
    pub fn and_all(fragments: impl IntoIterator<Item = Fragment>) -> Option<Fragment> {
        let mut joined: Option<Fragment> = None;
        for fragment in fragments.into_iter().filter(|f| !f.is_empty()) {
            match joined.as_mut() {
                Some(acc) => {
                    acc.push_sql(" and ").append(fragment);
                }
                None => joined = Some(fragment),
            }
        }
        joined
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Number of bound values
    pub fn value_count(&self) -> usize {
        self.parts
            .iter()
            .filter(|p| matches!(p, Part::Value(_)))
            .count()
    }

    /// Bound values in order
    pub fn values(&self) -> impl Iterator<Item = &SqlValue> {
        self.parts.iter().filter_map(|p| match p {
            Part::Value(v) => Some(v),
            Part::Sql(_) => None,
        })
    }

    pub(crate) fn push_to(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        for part in &self.parts {
            match part {
                Part::Sql(sql) => {
                    qb.push(sql);
                }
                Part::Value(value) => value.push_to(qb),
            }
        }
    }
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for part in &self.parts {
            match part {
                Part::Sql(sql) => write!(f, "{}", sql)?,
                Part::Value(value) => write!(f, "{}", value)?,
            }
        }
        Ok(())
    }
}

//! Record capability trait and static schema description
//!
//! Every persisted type implements [`Record`]. The trait replaces runtime
//! reflection: it declares the table, the known columns, the read-only
//! fields, the optional soft-delete column and the joinable relations. All
//! identifiers that end up in generated SQL come from these static tables,
//! never from client input.
//!
//! Serde field names of a record must match its column names, because
//! inserts and updates are driven by the record's JSON form.
//!
//! # Example
//!
//! ```rust
//! use crudkit::repository::{Record, RecordId, Relation};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, Default, Serialize, Deserialize, sqlx::FromRow)]
//! #[serde(default)]
//! struct Permission {
//!     id: i64,
//!     id_role: i64,
//!     target: String,
//!     value: i64,
//!     deleted_at: Option<chrono::DateTime<chrono::Utc>>,
//! }
//!
//! impl Record for Permission {
//!     const TABLE: &'static str = "permissions";
//!     const COLUMNS: &'static [&'static str] = &["id", "id_role", "target", "value", "deleted_at"];
//!     const DELETED_AT: Option<&'static str> = Some("deleted_at");
//!
//!     fn id(&self) -> RecordId {
//!         self.id
//!     }
//!
//!     fn relations() -> &'static [Relation] {
//!         const RELATIONS: &[Relation] = &[Relation {
//!             name: "role",
//!             table: "roles",
//!             local_key: "id_role",
//!             foreign_key: "id",
//!             columns: &["id", "name"],
//!             deleted_at: Some("deleted_at"),
//!         }];
//!         RELATIONS
//!     }
//! }
//!
//! assert_eq!(Permission::TABLE, "permissions");
//! assert!(Permission::has_column("target"));
//! assert!(Permission::relation("role").is_some());
//! ```

use regex::Regex;
use std::sync::LazyLock;

/// Store-assigned numeric identity
pub type RecordId = i64;

/// Structured field conversions applied to update payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldCoercion {
    /// `{"Number": "..."}` collapses to its raw string
    PhoneNumber,
}

/// A joinable sub-object of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relation {
    /// Key used in search objects and as the SQL alias
    pub name: &'static str,
    /// Joined table
    pub table: &'static str,
    /// Column on the root table
    pub local_key: &'static str,
    /// Column on the joined table
    pub foreign_key: &'static str,
    /// Columns of the joined table usable in search predicates
    pub columns: &'static [&'static str],
    /// Deletion timestamp column of the joined table; deleted rows never join
    pub deleted_at: Option<&'static str>,
}

impl Relation {
    /// Whether `column` belongs to the joined table
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.contains(&column)
    }
}

/// A persisted entity usable with the generic repository
pub trait Record: Send + Sync + Unpin + 'static {
    /// Table name
    const TABLE: &'static str;

    /// Identity column
    const ID_COLUMN: &'static str = "id";

    /// Every column of the table
    const COLUMNS: &'static [&'static str];

    /// Fields dropped from update payloads
    const READ_ONLY_FIELDS: &'static [&'static str] = &["id", "created_at", "updated_at", "deleted_at"];

    /// Deletion timestamp column; `None` means rows are hard-deleted
    const DELETED_AT: Option<&'static str> = None;

    /// Column stamped with `now()` on every update
    const UPDATED_AT: Option<&'static str> = None;

    /// Field receiving the caller's language id on create
    const LANGUAGE_FIELD: Option<&'static str> = None;

    /// Current identity
    fn id(&self) -> RecordId;

    /// Joinable relations
    fn relations() -> &'static [Relation] {
        &[]
    }

    /// Payload coercions keyed by field name
    fn coercions() -> &'static [(&'static str, FieldCoercion)] {
        &[]
    }

    /// Whether `column` exists on the table
    fn has_column(column: &str) -> bool {
        Self::COLUMNS.contains(&column)
    }

    /// Look up a relation by its search key
    fn relation(name: &str) -> Option<&'static Relation> {
        Self::relations().iter().find(|r| r.name == name)
    }

    /// Whether `field` is rejected from update payloads
    fn is_read_only(field: &str) -> bool {
        Self::READ_ONLY_FIELDS.contains(&field)
    }

    /// Whether the table supports soft delete
    fn is_soft_deletable() -> bool {
        Self::DELETED_AT.is_some()
    }

    /// Columns that may be written by create and update
    fn writable_columns() -> impl Iterator<Item = &'static str> {
        Self::COLUMNS.iter().copied().filter(|c| {
            *c != Self::ID_COLUMN && Some(*c) != Self::DELETED_AT && Some(*c) != Self::UPDATED_AT
        })
    }
}

static FIRST_CAP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(.)([A-Z][a-z]+)").expect("first-cap regex is valid"));
static ALL_CAP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-z0-9])([A-Z])").expect("all-cap regex is valid"));
static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier regex is valid"));

/// Convert `CamelCase` or `camelCase` to `snake_case`
///
/// ```rust
/// use crudkit::repository::to_snake_case;
///
/// assert_eq!(to_snake_case("createdAt"), "created_at");
/// assert_eq!(to_snake_case("UserRole"), "user_role");
/// assert_eq!(to_snake_case("-createdAt"), "-created_at");
/// ```
pub fn to_snake_case(input: &str) -> String {
    let snake = FIRST_CAP.replace_all(input, "${1}_${2}");
    let snake = ALL_CAP.replace_all(&snake, "${1}_${2}");
    snake.to_lowercase()
}

/// Pluralized snake_case table name for a type name
///
/// ```rust
/// use crudkit::repository::table_name_for;
///
/// assert_eq!(table_name_for("Thing"), "things");
/// assert_eq!(table_name_for("UserRole"), "user_roles");
/// ```
pub fn table_name_for(type_name: &str) -> String {
    let short = type_name.rsplit("::").next().unwrap_or(type_name);
    format!("{}s", to_snake_case(short))
}

/// Whether `name` is safe to splice into SQL as an identifier
pub fn is_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

//! Column/value sets written by create and update
//!
//! A [`Changeset`] is the JSON object of columns an update is allowed to
//! touch. It is derived from a record's serde form and never contains the
//! identity column, a read-only field or the deletion column, whatever the
//! caller supplied.

use serde::Serialize;
use serde_json::{Map, Value};

use super::error::{RepositoryError, RepositoryOperation, RepositoryResult};
use super::record::Record;

/// Validated column values for one write
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Changeset {
    values: Map<String, Value>,
}

impl Changeset {
    /// Every updatable column, nulls included
    pub fn full<T: Record + Serialize>(record: &T) -> RepositoryResult<Self> {
        let object = to_object(record, RepositoryOperation::Update)?;
        Ok(Self::collect::<T>(object, |_, _| true))
    }

    /// Only the listed keys
    ///
    /// Keys are matched against column names; anything read-only or unknown
    /// is ignored.
    ///
    /// ```rust
    /// use crudkit::repository::{Changeset, Record, RecordId};
    /// use serde::Serialize;
    ///
    /// #[derive(Serialize)]
    /// struct Thing {
    ///     id: i64,
    ///     name: String,
    ///     active: bool,
    /// }
    ///
    /// impl Record for Thing {
    ///     const TABLE: &'static str = "things";
    ///     const COLUMNS: &'static [&'static str] = &["id", "name", "active"];
    ///
    ///     fn id(&self) -> RecordId {
    ///         self.id
    ///     }
    /// }
    ///
    /// let thing = Thing { id: 9, name: "ann".into(), active: true };
    /// let changes = Changeset::partial(&thing, &["name", "id"]).unwrap();
    /// assert_eq!(changes.columns().collect::<Vec<_>>(), vec!["name"]);
    /// ```
    pub fn partial<T: Record + Serialize>(
        record: &T,
        keys: &[impl AsRef<str>],
    ) -> RepositoryResult<Self> {
        let object = to_object(record, RepositoryOperation::Update)?;
        Ok(Self::collect::<T>(object, |column, _| {
            keys.iter().any(|k| k.as_ref() == column)
        }))
    }

    /// Only the columns whose value is not null
    pub fn changed<T: Record + Serialize>(record: &T) -> RepositoryResult<Self> {
        let object = to_object(record, RepositoryOperation::Update)?;
        Ok(Self::collect::<T>(object, |_, value| !value.is_null()))
    }

    /// Non-null writable columns for an insert
    ///
    /// Read-only fields such as `created_at` may be inserted when present;
    /// the identity and deletion columns never are.
    pub(crate) fn insertable<T: Record + Serialize>(
        record: &T,
        operation: RepositoryOperation,
    ) -> RepositoryResult<Self> {
        let mut object = to_object(record, operation)?;
        let values = T::writable_columns()
            .filter_map(|column| match object.remove(column) {
                Some(value) if !value.is_null() => Some((column.to_string(), value)),
                _ => None,
            })
            .collect();
        Ok(Self { values })
    }

    fn collect<T: Record>(
        mut object: Map<String, Value>,
        keep: impl Fn(&str, &Value) -> bool,
    ) -> Self {
        let values = T::writable_columns()
            .filter(|column| !T::is_read_only(column))
            .filter_map(|column| {
                let value = object.remove(column)?;
                keep(column, &value).then(|| (column.to_string(), value))
            })
            .collect();
        Self { values }
    }

    /// Column names in schema order
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.values.contains_key(column)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The changes as one JSON object
    pub fn to_json(&self) -> Value {
        Value::Object(self.values.clone())
    }
}

fn to_object<T: Serialize>(
    record: &T,
    operation: RepositoryOperation,
) -> RepositoryResult<Map<String, Value>> {
    match serde_json::to_value(record) {
        Ok(Value::Object(object)) => Ok(object),
        Ok(_) => Err(RepositoryError::serialization_error(
            operation,
            "record does not serialize to a JSON object",
        )),
        Err(e) => Err(RepositoryError::serialization_error(operation, e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::RecordId;
    use serde_json::json;

    #[derive(Serialize)]
    struct Thing {
        id: i64,
        name: Option<String>,
        active: Option<bool>,
        created_at: Option<String>,
        updated_at: Option<String>,
        deleted_at: Option<String>,
    }

    impl Record for Thing {
        const TABLE: &'static str = "things";
        const COLUMNS: &'static [&'static str] =
            &["id", "name", "active", "created_at", "updated_at", "deleted_at"];
        const DELETED_AT: Option<&'static str> = Some("deleted_at");
        const UPDATED_AT: Option<&'static str> = Some("updated_at");

        fn id(&self) -> RecordId {
            self.id
        }
    }

    fn thing() -> Thing {
        Thing {
            id: 4,
            name: Some("ann".into()),
            active: None,
            created_at: Some("2024-01-01".into()),
            updated_at: Some("2024-01-02".into()),
            deleted_at: Some("2024-01-03".into()),
        }
    }

    #[test]
    fn test_full_keeps_nulls_and_skips_managed_columns() {
        let changes = Changeset::full(&thing()).unwrap();
        assert_eq!(changes.to_json(), json!({"name": "ann", "active": null}));
    }

    #[test]
    fn test_partial_never_touches_read_only_fields() {
        let changes = Changeset::partial(
            &thing(),
            &["id", "created_at", "updated_at", "deleted_at", "name"],
        )
        .unwrap();
        assert_eq!(changes.columns().collect::<Vec<_>>(), vec!["name"]);
        assert!(!changes.contains("created_at"));
        assert!(!changes.contains("id"));
    }

    #[test]
    fn test_partial_ignores_unknown_keys() {
        let changes = Changeset::partial(&thing(), &["bogus"]).unwrap();
        assert!(changes.is_empty());
    }

    #[test]
    fn test_changed_drops_nulls() {
        let changes = Changeset::changed(&thing()).unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes.get("name"), Some(&json!("ann")));
    }

    #[test]
    fn test_insertable_keeps_created_at() {
        let changes = Changeset::insertable(&thing(), RepositoryOperation::Create).unwrap();
        assert_eq!(
            changes.to_json(),
            json!({"name": "ann", "created_at": "2024-01-01"})
        );
    }

    #[test]
    fn test_non_object_record_is_rejected() {
        #[derive(Serialize)]
        struct Scalar(i64);

        impl Record for Scalar {
            const TABLE: &'static str = "scalars";
            const COLUMNS: &'static [&'static str] = &["id"];

            fn id(&self) -> RecordId {
                self.0
            }
        }

        let err = Changeset::full(&Scalar(1)).unwrap_err();
        assert_eq!(
            err.kind,
            crate::repository::RepositoryErrorKind::SerializationError
        );
    }
}

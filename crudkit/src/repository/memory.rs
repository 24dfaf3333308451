//! In-memory repository double for unit tests

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{
    Changeset, CrudRepository, FieldCoercion, OrderFilter, Page, Pager, Record, RecordId, RepositoryError,
    RepositoryErrorKind, RepositoryOperation, RepositoryResult, Scope, Searcher,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(default)]
pub(crate) struct Thing {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub active: bool,
    pub id_language: Option<i64>,
    pub phone: Option<String>,
    pub created_at: Option<String>,
    pub deleted_at: Option<String>,
}

impl Record for Thing {
    const TABLE: &'static str = "things";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "code",
        "name",
        "active",
        "id_language",
        "phone",
        "created_at",
        "deleted_at",
    ];
    const DELETED_AT: Option<&'static str> = Some("deleted_at");
    const LANGUAGE_FIELD: Option<&'static str> = Some("id_language");

    fn id(&self) -> RecordId {
        self.id
    }

    fn coercions() -> &'static [(&'static str, FieldCoercion)] {
        &[("phone", FieldCoercion::PhoneNumber)]
    }
}

struct Row<T> {
    record: T,
    deleted: bool,
}

/// Vec-backed repository; scopes, searchers and ordering are ignored
pub(crate) struct MemoryRepository<T> {
    rows: Mutex<Vec<Row<T>>>,
    next_id: AtomicI64,
    unique: Vec<(&'static str, &'static [&'static str])>,
    failure: Mutex<Option<RepositoryError>>,
}

impl<T> MemoryRepository<T>
where
    T: Record + Clone + Serialize + DeserializeOwned,
{
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1),
            unique: Vec::new(),
            failure: Mutex::new(None),
        }
    }

    /// Declare a unique constraint usable by `create_or_update`
    pub fn with_unique(mut self, constraint: &'static str, columns: &'static [&'static str]) -> Self {
        self.unique.push((constraint, columns));
        self
    }

    /// Make the next operation fail with `error`
    pub fn fail_next(&self, error: RepositoryError) {
        *self.failure.lock().unwrap() = Some(error);
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    fn take_failure(&self) -> RepositoryResult<()> {
        match self.failure.lock().unwrap().take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn page(&self, pager: &Pager, deleted: bool) -> Page<T> {
        let rows = self.rows.lock().unwrap();
        let matching: Vec<T> = rows
            .iter()
            .filter(|row| row.deleted == deleted)
            .map(|row| row.record.clone())
            .collect();
        let total = matching.len() as i64;
        let items = matching
            .into_iter()
            .skip(pager.offset() as usize)
            .take(pager.page_size() as usize)
            .collect();
        Page::new(items, total)
    }

    fn find(&self, id: RecordId, deleted: bool, operation: RepositoryOperation) -> RepositoryResult<T> {
        self.take_failure()?;
        self.rows
            .lock()
            .unwrap()
            .iter()
            .find(|row| row.deleted == deleted && row.record.id() == id)
            .map(|row| row.record.clone())
            .ok_or_else(|| RepositoryError::not_found(T::TABLE, id).with_operation(operation))
    }

    fn insert(&self, record: T) -> RepositoryResult<T> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut object = to_map(&record);
        object.insert(T::ID_COLUMN.to_string(), Value::from(id));
        let stored: T = from_map(object)?;
        self.rows.lock().unwrap().push(Row {
            record: stored.clone(),
            deleted: false,
        });
        Ok(stored)
    }

    fn apply(&self, id: RecordId, changes: &Map<String, Value>) -> RepositoryResult<T> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|row| !row.deleted && row.record.id() == id)
            .ok_or_else(|| RepositoryError::not_found(T::TABLE, id).with_operation(RepositoryOperation::Update))?;
        let mut object = to_map(&row.record);
        for (column, value) in changes {
            object.insert(column.clone(), value.clone());
        }
        row.record = from_map(object)?;
        Ok(row.record.clone())
    }
}

impl<T> CrudRepository<T> for MemoryRepository<T>
where
    T: Record + Clone + Serialize + DeserializeOwned,
{
    async fn find_all(
        &self,
        pager: &Pager,
        _order: &OrderFilter,
        _scope: &Scope,
        _searcher: Option<&Searcher>,
    ) -> RepositoryResult<Page<T>> {
        self.take_failure()?;
        Ok(self.page(pager, false))
    }

    async fn find_all_deleted(
        &self,
        pager: &Pager,
        _order: &OrderFilter,
        _scope: &Scope,
        _searcher: Option<&Searcher>,
    ) -> RepositoryResult<Page<T>> {
        self.take_failure()?;
        if !T::is_soft_deletable() {
            return Ok(Page::empty());
        }
        Ok(self.page(pager, true))
    }

    async fn find_full(&self, _scope: &Scope) -> RepositoryResult<Vec<T>> {
        self.take_failure()?;
        Ok(self.page(&Pager::new(1, i64::MAX, 0), false).items)
    }

    async fn find_one(&self, id: RecordId, _scope: &Scope) -> RepositoryResult<T> {
        self.find(id, false, RepositoryOperation::FindOne)
    }

    async fn find_one_deleted(&self, id: RecordId, _scope: &Scope) -> RepositoryResult<T> {
        self.find(id, true, RepositoryOperation::FindOneDeleted)
    }

    async fn create(&self, _scope: &Scope, record: T) -> RepositoryResult<T> {
        self.take_failure()?;
        self.insert(record)
    }

    async fn update(&self, id: RecordId, _scope: &Scope, changes: Changeset) -> RepositoryResult<T> {
        self.take_failure()?;
        let changes = match changes.to_json() {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        self.apply(id, &changes)
    }

    async fn delete(&self, id: RecordId) -> RepositoryResult<T> {
        let found = self.find(id, false, RepositoryOperation::Delete)?;
        let mut rows = self.rows.lock().unwrap();
        if T::is_soft_deletable() {
            if let Some(row) = rows.iter_mut().find(|row| !row.deleted && row.record.id() == id) {
                row.deleted = true;
            }
        } else {
            rows.retain(|row| row.record.id() != id);
        }
        Ok(found)
    }

    async fn recover(&self, id: RecordId) -> RepositoryResult<T> {
        let mut found = self.find(id, true, RepositoryOperation::Recover)?;
        let mut rows = self.rows.lock().unwrap();
        if let Some(row) = rows.iter_mut().find(|row| row.deleted && row.record.id() == id) {
            row.deleted = false;
            found = row.record.clone();
        }
        Ok(found)
    }

    async fn create_or_update(
        &self,
        _scope: &Scope,
        record: T,
        constraint: &str,
        update_columns: &[&str],
    ) -> RepositoryResult<T> {
        self.take_failure()?;
        if update_columns.is_empty() {
            return Err(RepositoryError::validation_failed(
                RepositoryOperation::Upsert,
                "no update columns",
            ));
        }
        let Some((_, key_columns)) = self.unique.iter().find(|(name, _)| *name == constraint) else {
            return Err(RepositoryError::new(
                RepositoryOperation::Upsert,
                RepositoryErrorKind::DatabaseError,
                format!("constraint \"{}\" does not exist", constraint),
            ));
        };

        let incoming = to_map(&record);
        let existing = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .map(|row| (row.record.id(), to_map(&row.record)))
            .find(|(_, stored)| key_columns.iter().all(|c| stored.get(*c) == incoming.get(*c)));

        match existing {
            Some((id, _)) => {
                let changes: Map<String, Value> = update_columns
                    .iter()
                    .filter_map(|c| incoming.get(*c).map(|v| (c.to_string(), v.clone())))
                    .collect();
                self.apply(id, &changes)
            }
            None => self.insert(record),
        }
    }
}

fn to_map<T: Serialize>(record: &T) -> Map<String, Value> {
    match serde_json::to_value(record) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

fn from_map<T: DeserializeOwned>(map: Map<String, Value>) -> RepositoryResult<T> {
    serde_json::from_value(Value::Object(map))
        .map_err(|e| RepositoryError::serialization_error(RepositoryOperation::Raw, e.to_string()))
}

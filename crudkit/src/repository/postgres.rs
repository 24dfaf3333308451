//! PostgreSQL implementation of [`CrudRepository`]
//!
//! Inserts and updates are generic over the record type without per-type
//! SQL: the record's JSON form is bound once and expanded server-side with
//! `jsonb_populate_record(NULL::<table>, $1)`, so each column is cast to the
//! table's own column type.
//!
//! ```sql
//! INSERT INTO things (name, active)
//!     SELECT name, active FROM jsonb_populate_record(NULL::things, $1)
//!     RETURNING id;
//!
//! UPDATE things SET name = src.name
//!     FROM jsonb_populate_record(NULL::things, $1) AS src
//!     WHERE things.id = $2;
//! ```
//!
//! Every write re-reads the row through the caller's scope before returning.

use std::marker::PhantomData;

use futures::future::BoxFuture;
use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{FromRow, PgConnection, PgPool, Postgres, QueryBuilder};

use super::changeset::Changeset;
use super::error::{RepositoryError, RepositoryOperation, RepositoryResult};
use super::order::OrderFilter;
use super::pager::Pager;
use super::query::{SelectQuery, Visibility};
use super::record::{is_identifier, Record, RecordId};
use super::scope::Scope;
use super::searcher::Searcher;
use super::sql::{Fragment, SqlValue};
use super::traits::{CrudRepository, Page};

/// Generic repository over a PostgreSQL pool
pub struct PgRepository<T> {
    pool: PgPool,
    _record: PhantomData<fn() -> T>,
}

impl<T> Clone for PgRepository<T> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            _record: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for PgRepository<T>
where
    T: Record,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgRepository")
            .field("table", &T::TABLE)
            .finish()
    }
}

impl<T> PgRepository<T>
where
    T: Record + Serialize + for<'r> FromRow<'r, PgRow>,
{
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            _record: PhantomData,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Where: a query restricted by an arbitrary predicate
    ///
    /// ```rust,ignore
    /// let predicate = Fragment::with_values("permissions.target = ? and permissions.value > ?", vec![
    ///     "users".into(),
    ///     1.into(),
    /// ])?;
    /// let rows = repo.filter(predicate).fetch_all().await?;
    /// ```
    pub fn filter(&self, predicate: Fragment) -> FilteredQuery<'_, T> {
        FilteredQuery {
            repository: self,
            query: base_query::<T>().filter(predicate),
        }
    }

    /// FindWhere: active rows matching every predicate
    pub async fn find_where(
        &self,
        predicates: impl IntoIterator<Item = Fragment>,
    ) -> RepositoryResult<Vec<T>> {
        match Fragment::and_all(predicates) {
            Some(predicate) => self.filter(predicate).fetch_all().await,
            None => self.find_full(&Scope::none()).await,
        }
    }

    /// Run `f` inside a transaction
    ///
    /// The transaction commits when `f` returns `Ok` and rolls back otherwise.
    ///
    /// ```rust,ignore
    /// repo.transaction(|conn| {
    ///     Box::pin(async move {
    ///         sqlx::query("UPDATE things SET active = false").execute(&mut *conn).await
    ///             .map_err(|e| RepositoryError::from_sqlx(RepositoryOperation::Transaction, e))?;
    ///         Ok(())
    ///     })
    /// })
    /// .await?;
    /// ```
    pub async fn transaction<R, F>(&self, f: F) -> RepositoryResult<R>
    where
        R: Send,
        F: for<'c> FnOnce(&'c mut PgConnection) -> BoxFuture<'c, RepositoryResult<R>> + Send,
    {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepositoryError::from_sqlx(RepositoryOperation::Transaction, e))?;

        match f(&mut *tx).await {
            Ok(value) => {
                tx.commit()
                    .await
                    .map_err(|e| RepositoryError::from_sqlx(RepositoryOperation::Transaction, e))?;
                Ok(value)
            }
            Err(error) => {
                if let Err(rollback) = tx.rollback().await {
                    tracing::warn!(
                        table = T::TABLE,
                        error = %rollback,
                        "Transaction rollback failed"
                    );
                }
                Err(error)
            }
        }
    }

    /// Raw: execute a statement with `?` placeholders, returning rows affected
    pub async fn raw_execute(&self, sql: &str, values: Vec<SqlValue>) -> RepositoryResult<u64> {
        let mut qb = raw_query(sql, values)?;
        let result = qb
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| RepositoryError::from_sqlx(RepositoryOperation::Raw, e))?;
        Ok(result.rows_affected())
    }

    /// Raw query decoded into `R`
    pub async fn raw_fetch_all<R>(&self, sql: &str, values: Vec<SqlValue>) -> RepositoryResult<Vec<R>>
    where
        R: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        let mut qb = raw_query(sql, values)?;
        qb.build_query_as::<R>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepositoryError::from_sqlx(RepositoryOperation::Raw, e))
    }

    /// Row: the first row of a raw query
    pub async fn raw_row(&self, sql: &str, values: Vec<SqlValue>) -> RepositoryResult<PgRow> {
        let mut qb = raw_query(sql, values)?;
        qb.build()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| RepositoryError::from_sqlx(RepositoryOperation::Raw, e))
    }

    async fn list(
        &self,
        visibility: Visibility,
        pager: &Pager,
        order: &OrderFilter,
        scope: &Scope,
        searcher: Option<&Searcher>,
        operation: RepositoryOperation,
    ) -> RepositoryResult<Page<T>> {
        let (count, select) = listing_queries::<T>(visibility, pager, order, scope, searcher);

        let mut qb = count.to_count();
        let total = qb
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| RepositoryError::from_sqlx(operation, e))?;

        let mut qb = select.to_select();
        tracing::debug!(table = T::TABLE, sql = %qb.sql(), "Listing records");
        let items = qb
            .build_query_as::<T>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepositoryError::from_sqlx(operation, e))?;

        Ok(Page::new(items, total))
    }

    async fn fetch_by_id(
        &self,
        id: RecordId,
        visibility: Visibility,
        scope: &Scope,
        operation: RepositoryOperation,
    ) -> RepositoryResult<T> {
        let query = scope
            .apply(base_query::<T>().with_visibility(visibility))
            .by_id(T::ID_COLUMN, id);
        let mut qb = query.to_select();
        qb.build_query_as::<T>()
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepositoryError::from_sqlx(operation, e).with_entity(T::TABLE, id.to_string()))?
            .ok_or_else(|| RepositoryError::not_found(T::TABLE, id).with_operation(operation))
    }

    async fn execute(
        &self,
        mut qb: QueryBuilder<'static, Postgres>,
        id: RecordId,
        operation: RepositoryOperation,
    ) -> RepositoryResult<u64> {
        tracing::debug!(table = T::TABLE, id, sql = %qb.sql(), "Executing {}", operation);
        let result = qb
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| RepositoryError::from_sqlx(operation, e).with_entity(T::TABLE, id.to_string()))?;
        Ok(result.rows_affected())
    }

    async fn returning_id(
        &self,
        mut qb: QueryBuilder<'static, Postgres>,
        operation: RepositoryOperation,
    ) -> RepositoryResult<RecordId> {
        tracing::debug!(table = T::TABLE, sql = %qb.sql(), "Executing {}", operation);
        qb.build_query_scalar::<RecordId>()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                let error = RepositoryError::from_sqlx(operation, e);
                error.with_entity(T::TABLE, "0")
            })
    }
}

impl<T> CrudRepository<T> for PgRepository<T>
where
    T: Record + Serialize + for<'r> FromRow<'r, PgRow>,
{
    async fn find_all(
        &self,
        pager: &Pager,
        order: &OrderFilter,
        scope: &Scope,
        searcher: Option<&Searcher>,
    ) -> RepositoryResult<Page<T>> {
        self.list(
            Visibility::Active,
            pager,
            order,
            scope,
            searcher,
            RepositoryOperation::FindAll,
        )
        .await
    }

    async fn find_all_deleted(
        &self,
        pager: &Pager,
        order: &OrderFilter,
        scope: &Scope,
        searcher: Option<&Searcher>,
    ) -> RepositoryResult<Page<T>> {
        if !T::is_soft_deletable() {
            return Ok(Page::empty());
        }
        self.list(
            Visibility::Deleted,
            pager,
            order,
            scope,
            searcher,
            RepositoryOperation::FindAllDeleted,
        )
        .await
    }

    async fn find_full(&self, scope: &Scope) -> RepositoryResult<Vec<T>> {
        let mut qb = scope.apply(base_query::<T>()).to_select();
        qb.build_query_as::<T>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepositoryError::from_sqlx(RepositoryOperation::FindAll, e))
    }

    async fn find_one(&self, id: RecordId, scope: &Scope) -> RepositoryResult<T> {
        self.fetch_by_id(id, Visibility::Active, scope, RepositoryOperation::FindOne)
            .await
    }

    async fn find_one_deleted(&self, id: RecordId, scope: &Scope) -> RepositoryResult<T> {
        if !T::is_soft_deletable() {
            return Err(RepositoryError::not_found(T::TABLE, id)
                .with_operation(RepositoryOperation::FindOneDeleted));
        }
        self.fetch_by_id(
            id,
            Visibility::Deleted,
            scope,
            RepositoryOperation::FindOneDeleted,
        )
        .await
    }

    async fn create(&self, scope: &Scope, record: T) -> RepositoryResult<T> {
        let changes = Changeset::insertable(&record, RepositoryOperation::Create)?;
        let id = self
            .returning_id(insert_query::<T>(&changes), RepositoryOperation::Create)
            .await?;
        self.fetch_by_id(id, Visibility::Active, scope, RepositoryOperation::Create)
            .await
    }

    async fn update(&self, id: RecordId, scope: &Scope, changes: Changeset) -> RepositoryResult<T> {
        self.fetch_by_id(id, Visibility::Active, &Scope::none(), RepositoryOperation::Update)
            .await?;
        if let Some(qb) = update_query::<T>(id, &changes) {
            self.execute(qb, id, RepositoryOperation::Update).await?;
        }
        self.fetch_by_id(id, Visibility::Active, scope, RepositoryOperation::Update)
            .await
    }

    async fn delete(&self, id: RecordId) -> RepositoryResult<T> {
        let found = self
            .fetch_by_id(id, Visibility::Active, &Scope::none(), RepositoryOperation::Delete)
            .await?;
        self.execute(delete_query::<T>(id), id, RepositoryOperation::Delete)
            .await?;
        Ok(found)
    }

    async fn recover(&self, id: RecordId) -> RepositoryResult<T> {
        let Some(qb) = recover_query::<T>(id) else {
            return Err(RepositoryError::not_found(T::TABLE, id)
                .with_operation(RepositoryOperation::Recover));
        };
        self.fetch_by_id(id, Visibility::Deleted, &Scope::none(), RepositoryOperation::Recover)
            .await?;
        self.execute(qb, id, RepositoryOperation::Recover).await?;
        self.fetch_by_id(id, Visibility::Active, &Scope::none(), RepositoryOperation::Recover)
            .await
    }

    async fn create_or_update(
        &self,
        scope: &Scope,
        record: T,
        constraint: &str,
        update_columns: &[&str],
    ) -> RepositoryResult<T> {
        let changes = Changeset::insertable(&record, RepositoryOperation::Upsert)?;
        let qb = upsert_query::<T>(&changes, constraint, update_columns)?;
        let id = self.returning_id(qb, RepositoryOperation::Upsert).await?;
        // The conflicting row may be soft-deleted; the write still stands.
        self.fetch_by_id(id, Visibility::All, scope, RepositoryOperation::Upsert)
            .await
    }
}

/// A select restricted by a caller predicate, see [`PgRepository::filter`]
pub struct FilteredQuery<'a, T> {
    repository: &'a PgRepository<T>,
    query: SelectQuery,
}

impl<T> FilteredQuery<'_, T>
where
    T: Record + Serialize + for<'r> FromRow<'r, PgRow>,
{
    /// Apply an additional scope
    #[must_use]
    pub fn scope(mut self, scope: &Scope) -> Self {
        self.query = scope.apply(self.query);
        self
    }

    pub async fn fetch_all(self) -> RepositoryResult<Vec<T>> {
        let mut qb = self.query.to_select();
        qb.build_query_as::<T>()
            .fetch_all(&self.repository.pool)
            .await
            .map_err(|e| RepositoryError::from_sqlx(RepositoryOperation::Raw, e))
    }

    pub async fn fetch_optional(self) -> RepositoryResult<Option<T>> {
        let mut qb = self.query.limit(1).to_select();
        qb.build_query_as::<T>()
            .fetch_optional(&self.repository.pool)
            .await
            .map_err(|e| RepositoryError::from_sqlx(RepositoryOperation::Raw, e))
    }

    pub async fn count(self) -> RepositoryResult<i64> {
        let mut qb = self.query.to_count();
        qb.build_query_scalar::<i64>()
            .fetch_one(&self.repository.pool)
            .await
            .map_err(|e| RepositoryError::from_sqlx(RepositoryOperation::Raw, e))
    }
}

fn base_query<T: Record>() -> SelectQuery {
    SelectQuery::new(T::TABLE, T::DELETED_AT)
}

/// Count and page queries for one listing
///
/// Both carry the same visibility, scope and search predicate; only the page
/// query is ordered and paginated.
fn listing_queries<T: Record>(
    visibility: Visibility,
    pager: &Pager,
    order: &OrderFilter,
    scope: &Scope,
    searcher: Option<&Searcher>,
) -> (SelectQuery, SelectQuery) {
    let search = searcher.map(Searcher::scope).unwrap_or_default();
    let filtered = search.apply(scope.apply(base_query::<T>().with_visibility(visibility)));
    let page = order.sort().then(pager.paginate()).apply(filtered.clone());
    (filtered, page)
}

fn raw_query(sql: &str, values: Vec<SqlValue>) -> RepositoryResult<QueryBuilder<'static, Postgres>> {
    let fragment = Fragment::with_values(sql, values)?;
    let mut qb = QueryBuilder::new("");
    fragment.push_to(&mut qb);
    Ok(qb)
}

fn column_list(changes: &Changeset) -> String {
    changes.columns().collect::<Vec<_>>().join(", ")
}

fn push_insert<T: Record>(qb: &mut QueryBuilder<'static, Postgres>, changes: &Changeset) {
    if changes.is_empty() {
        qb.push(format!("INSERT INTO {} DEFAULT VALUES", T::TABLE));
        return;
    }
    let columns = column_list(changes);
    qb.push(format!(
        "INSERT INTO {} ({}) SELECT {} FROM jsonb_populate_record(NULL::{}, ",
        T::TABLE,
        columns,
        columns,
        T::TABLE
    ));
    qb.push_bind(Json(changes.to_json()));
    qb.push(")");
}

fn insert_query<T: Record>(changes: &Changeset) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("");
    push_insert::<T>(&mut qb, changes);
    qb.push(format!(" RETURNING {}", T::ID_COLUMN));
    qb
}

/// `None` when there is nothing to assign
fn update_query<T: Record>(id: RecordId, changes: &Changeset) -> Option<QueryBuilder<'static, Postgres>> {
    let mut assignments: Vec<String> = changes
        .columns()
        .map(|column| format!("{} = src.{}", column, column))
        .collect();
    if let Some(column) = T::UPDATED_AT {
        assignments.push(format!("{} = now()", column));
    }
    if assignments.is_empty() {
        return None;
    }

    let mut qb = QueryBuilder::new(format!("UPDATE {} SET {}", T::TABLE, assignments.join(", ")));
    if !changes.is_empty() {
        qb.push(format!(" FROM jsonb_populate_record(NULL::{}, ", T::TABLE));
        qb.push_bind(Json(changes.to_json()));
        qb.push(") AS src");
    }
    qb.push(format!(" WHERE {}.{} = ", T::TABLE, T::ID_COLUMN));
    qb.push_bind(id);
    Some(qb)
}

fn delete_query<T: Record>(id: RecordId) -> QueryBuilder<'static, Postgres> {
    let mut qb = match T::DELETED_AT {
        Some(column) => QueryBuilder::new(format!("UPDATE {} SET {} = now()", T::TABLE, column)),
        None => QueryBuilder::new(format!("DELETE FROM {}", T::TABLE)),
    };
    qb.push(format!(" WHERE {}.{} = ", T::TABLE, T::ID_COLUMN));
    qb.push_bind(id);
    qb
}

/// `None` for records without soft delete
fn recover_query<T: Record>(id: RecordId) -> Option<QueryBuilder<'static, Postgres>> {
    let column = T::DELETED_AT?;
    let mut qb = QueryBuilder::new(format!(
        "UPDATE {} SET {} = NULL WHERE {}.{} = ",
        T::TABLE,
        column,
        T::TABLE,
        T::ID_COLUMN
    ));
    qb.push_bind(id);
    Some(qb)
}

fn upsert_query<T: Record>(
    changes: &Changeset,
    constraint: &str,
    update_columns: &[&str],
) -> RepositoryResult<QueryBuilder<'static, Postgres>> {
    let invalid = |message: String| {
        RepositoryError::validation_failed(RepositoryOperation::Upsert, message)
            .with_entity(T::TABLE, "0")
    };

    if !is_identifier(constraint) {
        return Err(invalid(format!("invalid constraint name {:?}", constraint)));
    }
    if update_columns.is_empty() {
        return Err(invalid("no columns to update on conflict".to_string()));
    }
    if let Some(column) = update_columns
        .iter()
        .find(|c| !T::writable_columns().any(|w| w == **c))
    {
        return Err(invalid(format!("{} is not a writable column", column)));
    }

    let mut assignments: Vec<String> = update_columns
        .iter()
        .map(|column| format!("{} = EXCLUDED.{}", column, column))
        .collect();
    if let Some(column) = T::UPDATED_AT {
        assignments.push(format!("{} = now()", column));
    }

    let mut qb = QueryBuilder::new("");
    push_insert::<T>(&mut qb, changes);
    qb.push(format!(
        " ON CONFLICT ON CONSTRAINT {} DO UPDATE SET {} RETURNING {}",
        constraint,
        assignments.join(", "),
        T::ID_COLUMN
    ));
    Ok(qb)
}

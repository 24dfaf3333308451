//! Service layer between handlers and the repository
//!
//! Each capability is its own trait so a resource can expose only part of
//! the CRUD surface. [`CrudService`] implements all of them by delegating to a
//! [`CrudRepository`]; business rules belong in a custom implementation.

use std::future::Future;
use std::marker::PhantomData;

use serde::Serialize;

use crate::repository::{
    Changeset, CrudRepository, OrderFilter, Page, Pager, Record, RecordId, RepositoryResult,
    Scope, Searcher,
};

/// Paginated listing of active records
pub trait ListRecords<T>: Send + Sync {
    fn find_all(
        &self,
        pager: &Pager,
        order: &OrderFilter,
        scope: &Scope,
        searcher: Option<&Searcher>,
    ) -> impl Future<Output = RepositoryResult<Page<T>>> + Send;
}

/// Paginated listing of soft-deleted records
pub trait ListDeletedRecords<T>: Send + Sync {
    fn find_all_deleted(
        &self,
        pager: &Pager,
        order: &OrderFilter,
        scope: &Scope,
        searcher: Option<&Searcher>,
    ) -> impl Future<Output = RepositoryResult<Page<T>>> + Send;
}

/// Single-record reads
pub trait ReadRecord<T>: Send + Sync {
    fn find_one(
        &self,
        id: RecordId,
        scope: &Scope,
    ) -> impl Future<Output = RepositoryResult<T>> + Send;

    fn find_one_deleted(
        &self,
        id: RecordId,
        scope: &Scope,
    ) -> impl Future<Output = RepositoryResult<T>> + Send;
}

/// Create and update
pub trait WriteRecord<T>: Send + Sync {
    fn create(&self, scope: &Scope, record: T) -> impl Future<Output = RepositoryResult<T>> + Send;

    /// Replace every updatable column with the record's values
    fn update(
        &self,
        id: RecordId,
        scope: &Scope,
        record: T,
    ) -> impl Future<Output = RepositoryResult<T>> + Send;

    /// Write only the columns in `changes`
    fn partial_update(
        &self,
        id: RecordId,
        scope: &Scope,
        changes: Changeset,
    ) -> impl Future<Output = RepositoryResult<T>> + Send;
}

/// Soft delete and restore
pub trait DeleteRecord<T>: Send + Sync {
    fn delete(&self, id: RecordId) -> impl Future<Output = RepositoryResult<T>> + Send;

    fn recover(&self, id: RecordId) -> impl Future<Output = RepositoryResult<T>> + Send;
}

/// Every capability at once
pub trait RecordService<T>:
    ListRecords<T> + ListDeletedRecords<T> + ReadRecord<T> + WriteRecord<T> + DeleteRecord<T>
{
}

impl<T, S> RecordService<T> for S where
    S: ListRecords<T> + ListDeletedRecords<T> + ReadRecord<T> + WriteRecord<T> + DeleteRecord<T>
{
}

/// Pass-through service over a repository
pub struct CrudService<T, R> {
    repository: R,
    _record: PhantomData<fn() -> T>,
}

impl<T, R> CrudService<T, R>
where
    T: Record,
    R: CrudRepository<T>,
{
    pub fn new(repository: R) -> Self {
        Self {
            repository,
            _record: PhantomData,
        }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }
}

impl<T, R> Clone for CrudService<T, R>
where
    R: Clone,
{
    fn clone(&self) -> Self {
        Self {
            repository: self.repository.clone(),
            _record: PhantomData,
        }
    }
}

impl<T, R> ListRecords<T> for CrudService<T, R>
where
    T: Record,
    R: CrudRepository<T>,
{
    async fn find_all(
        &self,
        pager: &Pager,
        order: &OrderFilter,
        scope: &Scope,
        searcher: Option<&Searcher>,
    ) -> RepositoryResult<Page<T>> {
        self.repository.find_all(pager, order, scope, searcher).await
    }
}

impl<T, R> ListDeletedRecords<T> for CrudService<T, R>
where
    T: Record,
    R: CrudRepository<T>,
{
    async fn find_all_deleted(
        &self,
        pager: &Pager,
        order: &OrderFilter,
        scope: &Scope,
        searcher: Option<&Searcher>,
    ) -> RepositoryResult<Page<T>> {
        self.repository
            .find_all_deleted(pager, order, scope, searcher)
            .await
    }
}

impl<T, R> ReadRecord<T> for CrudService<T, R>
where
    T: Record,
    R: CrudRepository<T>,
{
    async fn find_one(&self, id: RecordId, scope: &Scope) -> RepositoryResult<T> {
        self.repository.find_one(id, scope).await
    }

    async fn find_one_deleted(&self, id: RecordId, scope: &Scope) -> RepositoryResult<T> {
        self.repository.find_one_deleted(id, scope).await
    }
}

impl<T, R> WriteRecord<T> for CrudService<T, R>
where
    T: Record + Serialize,
    R: CrudRepository<T>,
{
    async fn create(&self, scope: &Scope, record: T) -> RepositoryResult<T> {
        self.repository.create(scope, record).await
    }

    async fn update(&self, id: RecordId, scope: &Scope, record: T) -> RepositoryResult<T> {
        let changes = Changeset::full(&record)?;
        self.repository.update(id, scope, changes).await
    }

    async fn partial_update(
        &self,
        id: RecordId,
        scope: &Scope,
        changes: Changeset,
    ) -> RepositoryResult<T> {
        self.repository.update(id, scope, changes).await
    }
}

impl<T, R> DeleteRecord<T> for CrudService<T, R>
where
    T: Record,
    R: CrudRepository<T>,
{
    async fn delete(&self, id: RecordId) -> RepositoryResult<T> {
        self.repository.delete(id).await
    }

    async fn recover(&self, id: RecordId) -> RepositoryResult<T> {
        self.repository.recover(id).await
    }
}

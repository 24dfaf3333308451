//! Repository trait definitions
//!
//! [`CrudRepository`] is the generic data-access contract shared by every
//! record type. Async methods use RPITIT (Return Position Impl Trait In
//! Traits) so implementations can be written with plain `async fn`.
//!
//! Reads take a caller-supplied [`Scope`] that is applied after the
//! soft-delete filter. Writes re-read the affected row through the scope so
//! the returned value matches what a subsequent read would see.

use std::future::Future;

use serde::Serialize;

use super::changeset::Changeset;
use super::error::RepositoryResult;
use super::order::OrderFilter;
use super::pager::Pager;
use super::record::{Record, RecordId};
use super::scope::Scope;
use super::searcher::Searcher;

/// One page of records and the total matching row count
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    /// Records on this page
    #[serde(rename = "data")]
    pub items: Vec<T>,
    /// Rows matching the filters, ignoring pagination
    pub total: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64) -> Self {
        Self { items, total }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), 0)
    }

    /// Convert the records, keeping the total
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
        }
    }
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self::empty()
    }
}

/// Generic CRUD operations over one record type
///
/// # Example
///
/// ```rust,ignore
/// use crudkit::repository::{CrudRepository, OrderFilter, Pager, Scope, Searcher};
///
/// let searcher = Searcher::parse::<Thing>(r#"{"active": true}"#);
/// let page = repo
///     .find_all(
///         &Pager::from_params(Some(2), Some(5)),
///         &OrderFilter::new::<Thing>(&["-created_at"]),
///         &Scope::none(),
///         searcher.as_ref(),
///     )
///     .await?;
/// println!("{} of {}", page.items.len(), page.total);
/// ```
pub trait CrudRepository<T: Record>: Send + Sync {
    /// Active rows matching scope and searcher, one page at a time
    ///
    /// The total is counted in a separate round trip under the same filters.
    fn find_all(
        &self,
        pager: &Pager,
        order: &OrderFilter,
        scope: &Scope,
        searcher: Option<&Searcher>,
    ) -> impl Future<Output = RepositoryResult<Page<T>>> + Send;

    /// Soft-deleted rows; always empty for hard-deleting records
    fn find_all_deleted(
        &self,
        pager: &Pager,
        order: &OrderFilter,
        scope: &Scope,
        searcher: Option<&Searcher>,
    ) -> impl Future<Output = RepositoryResult<Page<T>>> + Send;

    /// Every active row under the scope, unpaginated
    fn find_full(&self, scope: &Scope) -> impl Future<Output = RepositoryResult<Vec<T>>> + Send;

    /// One active row, or `NotFound`
    fn find_one(
        &self,
        id: RecordId,
        scope: &Scope,
    ) -> impl Future<Output = RepositoryResult<T>> + Send;

    /// One soft-deleted row, or `NotFound`
    fn find_one_deleted(
        &self,
        id: RecordId,
        scope: &Scope,
    ) -> impl Future<Output = RepositoryResult<T>> + Send;

    /// Insert and return the stored row
    fn create(&self, scope: &Scope, record: T) -> impl Future<Output = RepositoryResult<T>> + Send;

    /// Apply `changes` to an active row and return it
    fn update(
        &self,
        id: RecordId,
        scope: &Scope,
        changes: Changeset,
    ) -> impl Future<Output = RepositoryResult<T>> + Send;

    /// Soft-delete (or hard-delete) an active row, returning it as found
    fn delete(&self, id: RecordId) -> impl Future<Output = RepositoryResult<T>> + Send;

    /// Clear the deletion marker of a soft-deleted row
    fn recover(&self, id: RecordId) -> impl Future<Output = RepositoryResult<T>> + Send;

    /// Insert, or update `update_columns` when `constraint` is violated
    fn create_or_update(
        &self,
        scope: &Scope,
        record: T,
        constraint: &str,
        update_columns: &[&str],
    ) -> impl Future<Output = RepositoryResult<T>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::memory::{MemoryRepository, Thing};
    use crate::repository::RepositoryErrorKind;

    fn thing(code: &str, name: &str) -> Thing {
        Thing {
            code: code.to_string(),
            name: name.to_string(),
            active: true,
            ..Thing::default()
        }
    }

    async fn active_ids(repo: &MemoryRepository<Thing>) -> Vec<RecordId> {
        repo.find_all(&Pager::default(), &OrderFilter::default(), &Scope::none(), None)
            .await
            .unwrap()
            .items
            .iter()
            .map(|t| t.id)
            .collect()
    }

    async fn deleted_ids(repo: &MemoryRepository<Thing>) -> Vec<RecordId> {
        repo.find_all_deleted(&Pager::default(), &OrderFilter::default(), &Scope::none(), None)
            .await
            .unwrap()
            .items
            .iter()
            .map(|t| t.id)
            .collect()
    }

    #[test]
    fn test_page_serializes_as_envelope() {
        let page = Page::new(vec![1, 2], 7);
        assert_eq!(
            serde_json::to_value(&page).unwrap(),
            serde_json::json!({"data": [1, 2], "total": 7})
        );
        let page = page.map(|n| n * 10);
        assert_eq!(page.items, vec![10, 20]);
        assert_eq!(page.total, 7);
    }

    #[tokio::test]
    async fn test_soft_delete_round_trip() {
        let repo = MemoryRepository::<Thing>::new();
        let created = repo.create(&Scope::none(), thing("a", "ann")).await.unwrap();
        assert!(created.id > 0);
        assert_eq!(active_ids(&repo).await, vec![created.id]);

        let deleted = repo.delete(created.id).await.unwrap();
        assert_eq!(deleted.id, created.id);
        assert!(active_ids(&repo).await.is_empty());
        assert_eq!(deleted_ids(&repo).await, vec![created.id]);

        let err = repo.find_one(created.id, &Scope::none()).await.unwrap_err();
        assert_eq!(err.kind, RepositoryErrorKind::NotFound);
        assert!(repo.find_one_deleted(created.id, &Scope::none()).await.is_ok());

        repo.recover(created.id).await.unwrap();
        assert_eq!(active_ids(&repo).await, vec![created.id]);
        assert!(deleted_ids(&repo).await.is_empty());
    }

    #[tokio::test]
    async fn test_delete_twice_is_not_found() {
        let repo = MemoryRepository::<Thing>::new();
        let created = repo.create(&Scope::none(), thing("a", "ann")).await.unwrap();
        repo.delete(created.id).await.unwrap();
        let err = repo.delete(created.id).await.unwrap_err();
        assert!(err.is_not_found());
        let err = repo.recover(9999).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_upsert_twice_keeps_one_row() {
        let repo = MemoryRepository::<Thing>::new().with_unique("things_code_key", &["code"]);
        repo.create_or_update(&Scope::none(), thing("perm", "first"), "things_code_key", &["name"])
            .await
            .unwrap();
        let second = repo
            .create_or_update(&Scope::none(), thing("perm", "second"), "things_code_key", &["name"])
            .await
            .unwrap();

        let all = repo
            .find_all(&Pager::default(), &OrderFilter::default(), &Scope::none(), None)
            .await
            .unwrap();
        assert_eq!(all.total, 1);
        assert_eq!(all.items[0].name, "second");
        assert_eq!(all.items[0].id, second.id);
    }

    #[tokio::test]
    async fn test_upsert_rejects_empty_update_columns() {
        let repo = MemoryRepository::<Thing>::new().with_unique("things_code_key", &["code"]);
        let err = repo
            .create_or_update(&Scope::none(), thing("perm", "x"), "things_code_key", &[])
            .await
            .unwrap_err();
        assert_eq!(err.kind, RepositoryErrorKind::ValidationFailed);
    }

    #[tokio::test]
    async fn test_update_applies_only_changeset() {
        let repo = MemoryRepository::<Thing>::new();
        let created = repo.create(&Scope::none(), thing("a", "ann")).await.unwrap();

        let mut incoming = thing("changed", "bob");
        incoming.id = 777;
        let changes = Changeset::partial(&incoming, &["name", "id"]).unwrap();
        let updated = repo.update(created.id, &Scope::none(), changes).await.unwrap();

        assert_eq!(updated.id, created.id);
        assert_eq!(updated.name, "bob");
        assert_eq!(updated.code, "a");
    }

    #[tokio::test]
    async fn test_pager_limits_page_but_not_total() {
        let repo = MemoryRepository::<Thing>::new();
        for i in 0..12 {
            repo.create(&Scope::none(), thing(&format!("c{i}"), "n"))
                .await
                .unwrap();
        }
        let page = repo
            .find_all(
                &Pager::from_params(Some(2), Some(5)),
                &OrderFilter::default(),
                &Scope::none(),
                None,
            )
            .await
            .unwrap();
        assert_eq!(page.items.len(), 5);
        assert_eq!(page.total, 12);
        assert_eq!(page.items[0].id, 6);
    }
}

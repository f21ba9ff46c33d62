//! Scope store.

use std::sync::Arc;

use futures_util::stream::BoxStream;

use oxauth_core::Scope;
use oxauth_storage::keys;
use oxauth_storage::schema::{ATTR_SCOPE_NAME, ATTR_SCOPE_RESOURCE, index};
use oxauth_storage::{KeyValueTable, QueryRequest, RecordKind, StorageResult};

use crate::cas::ConcurrencyController;
use crate::projection::ProjectionMaintainer;
use crate::query::{self, deferred_stream, err_stream};

/// Persistent store for [`Scope`] entities.
///
/// Mutations keep the resource projections in lockstep, so
/// [`ScopeStore::find_by_resource`] stays an exact index lookup.
#[derive(Clone)]
pub struct ScopeStore {
    table: Arc<dyn KeyValueTable>,
    cas: ConcurrencyController,
    projections: ProjectionMaintainer,
}

impl ScopeStore {
    /// Creates a store over the given backend.
    #[must_use]
    pub fn new(table: Arc<dyn KeyValueTable>) -> Self {
        Self {
            cas: ConcurrencyController::new(table.clone()),
            projections: ProjectionMaintainer::new(table.clone()),
            table,
        }
    }

    /// Counts the stored scopes.
    ///
    /// # Errors
    ///
    /// Returns an error when the underlying scan fails.
    pub async fn count(&self) -> StorageResult<usize> {
        query::count_kind(self.table.as_ref(), RecordKind::Scope).await
    }

    /// Inserts a new scope, assigning its id and concurrency token when
    /// empty, and materializes its resource projections.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` when `name` is empty and `DuplicateKey`
    /// when the id is already taken.
    pub async fn create(&self, scope: Scope) -> StorageResult<Scope> {
        query::require_arg("name", &scope.name)?;
        let created = self.cas.create(scope).await?;
        self.projections.reconcile_scope(&created, None).await?;
        Ok(created)
    }

    /// Rewrites a scope conditionally on its concurrency token and
    /// reconciles its resource projections against the stored list.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when the id does not exist and
    /// `ConcurrencyConflict` when the token is stale.
    pub async fn update(&self, scope: Scope) -> StorageResult<Scope> {
        query::require_arg("id", &scope.id)?;
        query::require_arg("name", &scope.name)?;
        let previous: Option<Scope> = self.cas.load(&scope.id).await?;
        let updated = self.cas.update(scope).await?;
        self.projections
            .reconcile_scope(&updated, previous.as_ref())
            .await?;
        Ok(updated)
    }

    /// Deletes a scope and tears down its resource projections. Deleting an
    /// unknown id succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure failures.
    pub async fn delete(&self, id: &str) -> StorageResult<()> {
        query::require_arg("id", id)?;
        self.cas.delete(RecordKind::Scope, id).await?;
        self.projections.teardown_scope(id).await
    }

    /// Loads a scope by id (strongly consistent).
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` when `id` is empty.
    pub async fn find_by_id(&self, id: &str) -> StorageResult<Option<Scope>> {
        query::require_arg("id", id)?;
        self.cas.load(id).await
    }

    /// Looks up a scope by its name.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` when `name` is empty.
    pub async fn find_by_name(&self, name: &str) -> StorageResult<Option<Scope>> {
        query::require_arg("name", name)?;
        query::find_unique::<Scope>(
            self.table.as_ref(),
            QueryRequest::index(index::NAME, ATTR_SCOPE_NAME, name),
        )
        .await
    }

    /// Streams the scopes matching any of the given names. Unknown names
    /// are skipped; duplicates in `names` do not produce duplicate results.
    pub fn find_by_names(&self, names: &[String]) -> BoxStream<'static, StorageResult<Scope>> {
        for name in names {
            if let Err(err) = query::require_arg("names", name) {
                return err_stream(err);
            }
        }
        let table = self.table.clone();
        let mut names: Vec<String> = names.to_vec();
        names.sort();
        names.dedup();
        deferred_stream(async move {
            let mut scopes = Vec::new();
            for name in &names {
                let request = QueryRequest::index(index::NAME, ATTR_SCOPE_NAME, name.as_str());
                if let Some(scope) =
                    query::find_unique::<Scope>(table.as_ref(), request).await?
                {
                    scopes.push(scope);
                }
            }
            Ok(scopes)
        })
    }

    /// Streams the scopes whose `resources` contain the given resource
    /// (exact match).
    pub fn find_by_resource(&self, resource: &str) -> BoxStream<'static, StorageResult<Scope>> {
        if let Err(err) = query::require_arg("resource", resource) {
            return err_stream(err);
        }
        let table = self.table.clone();
        let resource = resource.to_string();
        deferred_stream(async move {
            let request =
                QueryRequest::index(index::RESOURCE, ATTR_SCOPE_RESOURCE, resource.as_str());
            let records = query::collect_records(table.as_ref(), request).await?;
            // Projection partition keys are the parent scope keys, so the
            // parents resolve without parsing ids back out.
            let ids: Vec<String> = records
                .iter()
                .filter(|record| record.kind() == Some(RecordKind::ResourceProjection))
                .filter_map(|record| {
                    record
                        .pk
                        .strip_prefix(&keys::entity_pk(RecordKind::Scope, ""))
                        .map(str::to_string)
                })
                .collect();
            query::batch_load::<Scope>(table.as_ref(), &ids).await
        })
    }

    /// Streams all scopes. Paging follows the contract documented on
    /// [`ApplicationStore::list`](crate::ApplicationStore::list).
    pub fn list(
        &self,
        count: Option<usize>,
        offset: Option<usize>,
    ) -> BoxStream<'static, StorageResult<Scope>> {
        query::list_stream(self.table.clone(), count, offset)
    }
}

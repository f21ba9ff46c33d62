//! Application store.

use std::sync::Arc;

use futures_util::stream::BoxStream;

use oxauth_core::Application;
use oxauth_storage::keys::{self, RedirectKind};
use oxauth_storage::schema::{ATTR_APPLICATION_ID, ATTR_CLIENT_ID, ATTR_SK, index};
use oxauth_storage::{KeyValueTable, QueryRequest, RecordKind, StorageResult};

use crate::cas::ConcurrencyController;
use crate::projection::ProjectionMaintainer;
use crate::query::{self, deferred_stream, err_stream};

/// Persistent store for [`Application`] entities.
///
/// Mutations go through optimistic concurrency control and keep the
/// redirect URI projections in lockstep, so
/// [`ApplicationStore::find_by_redirect_uri`] stays an exact key lookup.
#[derive(Clone)]
pub struct ApplicationStore {
    table: Arc<dyn KeyValueTable>,
    cas: ConcurrencyController,
    projections: ProjectionMaintainer,
}

impl ApplicationStore {
    /// Creates a store over the given backend.
    #[must_use]
    pub fn new(table: Arc<dyn KeyValueTable>) -> Self {
        Self {
            cas: ConcurrencyController::new(table.clone()),
            projections: ProjectionMaintainer::new(table.clone()),
            table,
        }
    }

    /// Counts the stored applications.
    ///
    /// # Errors
    ///
    /// Returns an error when the underlying scan fails.
    pub async fn count(&self) -> StorageResult<usize> {
        query::count_kind(self.table.as_ref(), RecordKind::Application).await
    }

    /// Inserts a new application, assigning its id and concurrency token
    /// when empty, and materializes its redirect projections.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` when `client_id` is empty and
    /// `DuplicateKey` when the id is already taken.
    pub async fn create(&self, application: Application) -> StorageResult<Application> {
        query::require_arg("client_id", &application.client_id)?;
        let created = self.cas.create(application).await?;
        self.projections.reconcile_application(&created, None).await?;
        Ok(created)
    }

    /// Rewrites an application conditionally on its concurrency token and
    /// reconciles its redirect projections against the stored lists.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when the id does not exist and
    /// `ConcurrencyConflict` when the token is stale; the stored record is
    /// left unchanged in both cases.
    pub async fn update(&self, application: Application) -> StorageResult<Application> {
        query::require_arg("id", &application.id)?;
        query::require_arg("client_id", &application.client_id)?;
        let previous: Option<Application> = self.cas.load(&application.id).await?;
        let updated = self.cas.update(application).await?;
        self.projections
            .reconcile_application(&updated, previous.as_ref())
            .await?;
        Ok(updated)
    }

    /// Deletes an application and tears down its redirect projections.
    /// Deleting an unknown id succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure failures.
    pub async fn delete(&self, id: &str) -> StorageResult<()> {
        query::require_arg("id", id)?;
        self.cas.delete(RecordKind::Application, id).await?;
        self.projections.teardown_application(id).await
    }

    /// Loads an application by id (strongly consistent).
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` when `id` is empty.
    pub async fn find_by_id(&self, id: &str) -> StorageResult<Option<Application>> {
        query::require_arg("id", id)?;
        self.cas.load(id).await
    }

    /// Looks up an application by its client identifier.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` when `client_id` is empty.
    pub async fn find_by_client_id(&self, client_id: &str) -> StorageResult<Option<Application>> {
        query::require_arg("client_id", client_id)?;
        query::find_unique::<Application>(
            self.table.as_ref(),
            QueryRequest::index(index::CLIENT_ID, ATTR_CLIENT_ID, client_id),
        )
        .await
    }

    /// Streams the applications whose `redirect_uris` contain the given URI
    /// (exact match).
    pub fn find_by_redirect_uri(&self, uri: &str) -> BoxStream<'static, StorageResult<Application>> {
        self.find_by_redirect(RedirectKind::Redirect, uri)
    }

    /// Streams the applications whose `post_logout_redirect_uris` contain
    /// the given URI (exact match).
    pub fn find_by_post_logout_redirect_uri(
        &self,
        uri: &str,
    ) -> BoxStream<'static, StorageResult<Application>> {
        self.find_by_redirect(RedirectKind::PostLogout, uri)
    }

    fn find_by_redirect(
        &self,
        kind: RedirectKind,
        uri: &str,
    ) -> BoxStream<'static, StorageResult<Application>> {
        if let Err(err) = query::require_arg("uri", uri) {
            return err_stream(err);
        }
        let table = self.table.clone();
        let uri = uri.to_string();
        deferred_stream(async move {
            let request = QueryRequest::partition(keys::redirect_pk(&uri))
                .with_range_prefix(ATTR_SK, kind.sk_prefix());
            let records = query::collect_records(table.as_ref(), request).await?;
            let ids: Vec<String> = records
                .iter()
                .filter(|record| record.kind() == Some(RecordKind::RedirectProjection))
                .filter_map(|record| record.get_str(ATTR_APPLICATION_ID).map(str::to_string))
                .collect();
            query::batch_load::<Application>(table.as_ref(), &ids).await
        })
    }

    /// Streams applications.
    ///
    /// With no arguments the stream lazily follows continuation cursors to
    /// exhaustion. With `count` it yields the first `count` records. With
    /// `count` and a page-aligned `offset` it yields exactly that page; a
    /// misaligned
    /// offset, or an offset without a count, fails with
    /// `UnsupportedPagination`. The other stores' `list` methods follow the
    /// same contract.
    pub fn list(
        &self,
        count: Option<usize>,
        offset: Option<usize>,
    ) -> BoxStream<'static, StorageResult<Application>> {
        query::list_stream(self.table.clone(), count, offset)
    }
}

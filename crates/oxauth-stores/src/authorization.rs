//! Authorization store.

use std::collections::BTreeSet;
use std::sync::Arc;

use futures_util::future;
use futures_util::stream::{BoxStream, StreamExt};
use time::OffsetDateTime;

use oxauth_core::Authorization;
use oxauth_storage::schema::{
    ATTR_APPLICATION_ID, ATTR_SEARCH_KEY, ATTR_SUBJECT, index,
};
use oxauth_storage::{KeyValueTable, QueryRequest, RecordKind, StorageResult};

use crate::cas::ConcurrencyController;
use crate::codec::search_key;
use crate::pruner::RetentionPruner;
use crate::query::{self, err_stream, index_stream};

/// Optional post-filters for [`AuthorizationStore::find`]. Applied in memory
/// after the compound index narrows the candidates to one subject and
/// application.
#[derive(Debug, Clone, Default)]
pub struct AuthorizationFilter {
    /// Keep only authorizations with this exact status.
    pub status: Option<String>,
    /// Keep only authorizations of this exact kind.
    pub kind: Option<String>,
    /// Keep only authorizations whose scope set contains every listed scope.
    pub scopes: Option<BTreeSet<String>>,
}

impl AuthorizationFilter {
    fn matches(&self, authorization: &Authorization) -> bool {
        if let Some(status) = &self.status
            && authorization.status.as_deref() != Some(status.as_str())
        {
            return false;
        }
        if let Some(kind) = &self.kind
            && authorization.kind.as_deref() != Some(kind.as_str())
        {
            return false;
        }
        if let Some(scopes) = &self.scopes
            && !scopes.is_subset(&authorization.scopes)
        {
            return false;
        }
        true
    }
}

/// Persistent store for [`Authorization`] entities.
#[derive(Clone)]
pub struct AuthorizationStore {
    table: Arc<dyn KeyValueTable>,
    cas: ConcurrencyController,
    pruner: RetentionPruner,
}

impl AuthorizationStore {
    /// Creates a store over the given backend.
    #[must_use]
    pub fn new(table: Arc<dyn KeyValueTable>) -> Self {
        Self {
            cas: ConcurrencyController::new(table.clone()),
            pruner: RetentionPruner::new(table.clone()),
            table,
        }
    }

    /// Counts the stored authorizations.
    ///
    /// # Errors
    ///
    /// Returns an error when the underlying scan fails.
    pub async fn count(&self) -> StorageResult<usize> {
        query::count_kind(self.table.as_ref(), RecordKind::Authorization).await
    }

    /// Inserts a new authorization, assigning its id and concurrency token
    /// when empty.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` when `application_id` or `subject` is empty
    /// and `DuplicateKey` when the id is already taken.
    pub async fn create(&self, authorization: Authorization) -> StorageResult<Authorization> {
        query::require_arg("application_id", &authorization.application_id)?;
        query::require_arg("subject", &authorization.subject)?;
        self.cas.create(authorization).await
    }

    /// Rewrites an authorization conditionally on its concurrency token.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when the id does not exist and
    /// `ConcurrencyConflict` when the token is stale.
    pub async fn update(&self, authorization: Authorization) -> StorageResult<Authorization> {
        query::require_arg("id", &authorization.id)?;
        self.cas.update(authorization).await
    }

    /// Deletes an authorization. Tokens referencing it are left in place for
    /// the retention pruner. Deleting an unknown id succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure failures.
    pub async fn delete(&self, id: &str) -> StorageResult<()> {
        query::require_arg("id", id)?;
        self.cas.delete(RecordKind::Authorization, id).await
    }

    /// Loads an authorization by id (strongly consistent).
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` when `id` is empty.
    pub async fn find_by_id(&self, id: &str) -> StorageResult<Option<Authorization>> {
        query::require_arg("id", id)?;
        self.cas.load(id).await
    }

    /// Streams the authorizations granted to an application.
    pub fn find_by_application_id(
        &self,
        application_id: &str,
    ) -> BoxStream<'static, StorageResult<Authorization>> {
        if let Err(err) = query::require_arg("application_id", application_id) {
            return err_stream(err);
        }
        index_stream(
            self.table.clone(),
            QueryRequest::index(index::APPLICATION_ID, ATTR_APPLICATION_ID, application_id),
        )
    }

    /// Streams the authorizations granted by a subject.
    pub fn find_by_subject(&self, subject: &str) -> BoxStream<'static, StorageResult<Authorization>> {
        if let Err(err) = query::require_arg("subject", subject) {
            return err_stream(err);
        }
        index_stream(
            self.table.clone(),
            QueryRequest::index(index::SUBJECT, ATTR_SUBJECT, subject),
        )
    }

    /// Streams the authorizations granted by a subject to an application,
    /// optionally narrowed by [`AuthorizationFilter`]. The subject and
    /// application pair rides the compound index exactly; the remaining
    /// filters are applied in memory.
    pub fn find(
        &self,
        subject: &str,
        application_id: &str,
        filter: AuthorizationFilter,
    ) -> BoxStream<'static, StorageResult<Authorization>> {
        if let Err(err) = query::require_arg("subject", subject) {
            return err_stream(err);
        }
        if let Err(err) = query::require_arg("application_id", application_id) {
            return err_stream(err);
        }
        let request = QueryRequest::index(index::SUBJECT_SEARCH_KEY, ATTR_SUBJECT, subject)
            .with_range_eq(ATTR_SEARCH_KEY, search_key(subject, application_id));
        index_stream::<Authorization>(self.table.clone(), request)
            .filter(move |result| {
                future::ready(match result {
                    Ok(authorization) => filter.matches(authorization),
                    Err(_) => true,
                })
            })
            .boxed()
    }

    /// Streams all authorizations. Paging follows the contract documented
    /// on [`ApplicationStore::list`](crate::ApplicationStore::list).
    pub fn list(
        &self,
        count: Option<usize>,
        offset: Option<usize>,
    ) -> BoxStream<'static, StorageResult<Authorization>> {
        query::list_stream(self.table.clone(), count, offset)
    }

    /// Removes stale authorizations created at or before `threshold`: ad-hoc
    /// ones no token references any more, and others whose status is no
    /// longer valid. Idempotent. Returns the number of deletions.
    ///
    /// # Errors
    ///
    /// Returns an error when a scan, lookup, or delete fails; deletions
    /// already applied stay applied.
    pub async fn prune(&self, threshold: OffsetDateTime) -> StorageResult<usize> {
        self.pruner.prune_authorizations(threshold).await
    }
}

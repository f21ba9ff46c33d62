//! Token store.

use std::sync::Arc;

use futures_util::future;
use futures_util::stream::{BoxStream, StreamExt};
use time::OffsetDateTime;

use oxauth_core::Token;
use oxauth_storage::schema::{
    ATTR_APPLICATION_ID, ATTR_AUTHORIZATION_ID, ATTR_REFERENCE_ID, ATTR_SEARCH_KEY, ATTR_SUBJECT,
    index,
};
use oxauth_storage::{KeyValueTable, QueryRequest, RecordKind, StorageResult};

use crate::cas::ConcurrencyController;
use crate::codec::search_key;
use crate::pruner::RetentionPruner;
use crate::query::{self, err_stream, index_stream};

/// Optional post-filters for [`TokenStore::find`]. Applied in memory after
/// the compound index narrows the candidates to one subject and application.
#[derive(Debug, Clone, Default)]
pub struct TokenFilter {
    /// Keep only tokens with this exact status.
    pub status: Option<String>,
    /// Keep only tokens of this exact kind.
    pub kind: Option<String>,
}

impl TokenFilter {
    fn matches(&self, token: &Token) -> bool {
        if let Some(status) = &self.status
            && token.status.as_deref() != Some(status.as_str())
        {
            return false;
        }
        if let Some(kind) = &self.kind
            && token.kind.as_deref() != Some(kind.as_str())
        {
            return false;
        }
        true
    }
}

/// Persistent store for [`Token`] entities.
#[derive(Clone)]
pub struct TokenStore {
    table: Arc<dyn KeyValueTable>,
    cas: ConcurrencyController,
    pruner: RetentionPruner,
}

impl TokenStore {
    /// Creates a store over the given backend.
    #[must_use]
    pub fn new(table: Arc<dyn KeyValueTable>) -> Self {
        Self {
            cas: ConcurrencyController::new(table.clone()),
            pruner: RetentionPruner::new(table.clone()),
            table,
        }
    }

    /// Counts the stored tokens.
    ///
    /// # Errors
    ///
    /// Returns an error when the underlying scan fails.
    pub async fn count(&self) -> StorageResult<usize> {
        query::count_kind(self.table.as_ref(), RecordKind::Token).await
    }

    /// Inserts a new token, assigning its id and concurrency token when
    /// empty. The subject may stay empty for client-credentials tokens.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` when `application_id` is empty and
    /// `DuplicateKey` when the id is already taken.
    pub async fn create(&self, token: Token) -> StorageResult<Token> {
        query::require_arg("application_id", &token.application_id)?;
        self.cas.create(token).await
    }

    /// Rewrites a token conditionally on its concurrency token.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when the id does not exist and
    /// `ConcurrencyConflict` when the token is stale.
    pub async fn update(&self, token: Token) -> StorageResult<Token> {
        query::require_arg("id", &token.id)?;
        self.cas.update(token).await
    }

    /// Deletes a token. Deleting an unknown id succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure failures.
    pub async fn delete(&self, id: &str) -> StorageResult<()> {
        query::require_arg("id", id)?;
        self.cas.delete(RecordKind::Token, id).await
    }

    /// Loads a token by id (strongly consistent).
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` when `id` is empty.
    pub async fn find_by_id(&self, id: &str) -> StorageResult<Option<Token>> {
        query::require_arg("id", id)?;
        self.cas.load(id).await
    }

    /// Streams the tokens issued to an application.
    pub fn find_by_application_id(
        &self,
        application_id: &str,
    ) -> BoxStream<'static, StorageResult<Token>> {
        if let Err(err) = query::require_arg("application_id", application_id) {
            return err_stream(err);
        }
        index_stream(
            self.table.clone(),
            QueryRequest::index(index::APPLICATION_ID, ATTR_APPLICATION_ID, application_id),
        )
    }

    /// Streams the tokens issued under an authorization, whatever their
    /// status.
    pub fn find_by_authorization_id(
        &self,
        authorization_id: &str,
    ) -> BoxStream<'static, StorageResult<Token>> {
        if let Err(err) = query::require_arg("authorization_id", authorization_id) {
            return err_stream(err);
        }
        index_stream(
            self.table.clone(),
            QueryRequest::index(
                index::AUTHORIZATION_ID,
                ATTR_AUTHORIZATION_ID,
                authorization_id,
            ),
        )
    }

    /// Looks up a reference token by its reference identifier.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` when `reference_id` is empty.
    pub async fn find_by_reference_id(&self, reference_id: &str) -> StorageResult<Option<Token>> {
        query::require_arg("reference_id", reference_id)?;
        query::find_unique::<Token>(
            self.table.as_ref(),
            QueryRequest::index(index::REFERENCE_ID, ATTR_REFERENCE_ID, reference_id),
        )
        .await
    }

    /// Streams the tokens issued to an application for a subject, optionally
    /// narrowed by [`TokenFilter`]. The subject and application pair rides
    /// the compound index exactly; the remaining filters are applied in
    /// memory.
    pub fn find(
        &self,
        subject: &str,
        application_id: &str,
        filter: TokenFilter,
    ) -> BoxStream<'static, StorageResult<Token>> {
        if let Err(err) = query::require_arg("subject", subject) {
            return err_stream(err);
        }
        if let Err(err) = query::require_arg("application_id", application_id) {
            return err_stream(err);
        }
        let request = QueryRequest::index(index::SUBJECT_SEARCH_KEY, ATTR_SUBJECT, subject)
            .with_range_eq(ATTR_SEARCH_KEY, search_key(subject, application_id));
        index_stream::<Token>(self.table.clone(), request)
            .filter(move |result| {
                future::ready(match result {
                    Ok(token) => filter.matches(token),
                    Err(_) => true,
                })
            })
            .boxed()
    }

    /// Streams all tokens. Paging follows the contract documented on
    /// [`ApplicationStore::list`](crate::ApplicationStore::list).
    pub fn list(
        &self,
        count: Option<usize>,
        offset: Option<usize>,
    ) -> BoxStream<'static, StorageResult<Token>> {
        query::list_stream(self.table.clone(), count, offset)
    }

    /// Removes stale tokens created at or before `threshold`: tokens that
    /// are no longer live and tokens whose authorization is missing or not
    /// valid. Idempotent. Returns the number of deletions.
    ///
    /// # Errors
    ///
    /// Returns an error when a scan, lookup, or delete fails; deletions
    /// already applied stay applied.
    pub async fn prune(&self, threshold: OffsetDateTime) -> StorageResult<usize> {
        self.pruner.prune_tokens(threshold).await
    }
}

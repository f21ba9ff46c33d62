//! Optimistic concurrency control for entity records.
//!
//! Every entity carries an opaque concurrency token rotated on each
//! successful write. Creates insert conditionally on key absence; updates
//! write conditionally on the stored token matching the caller's copy. A
//! failed update condition is ambiguous at the backend (missing record and
//! stale token look the same), so the controller re-reads the primary key
//! once to classify the failure. There is no automatic retry: a conflict is
//! the caller's to resolve by reloading.

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use oxauth_storage::keys;
use oxauth_storage::{KeyValueTable, PutCondition, Record, RecordKind, StorageError, StorageResult};

use crate::artifact::Artifact;

/// Generates engine-assigned identifiers and version tokens.
fn fresh_token() -> String {
    Uuid::new_v4().to_string()
}

/// The concurrency controller shared by every store.
#[derive(Clone)]
pub(crate) struct ConcurrencyController {
    table: Arc<dyn KeyValueTable>,
}

impl ConcurrencyController {
    pub(crate) fn new(table: Arc<dyn KeyValueTable>) -> Self {
        Self { table }
    }

    /// Reads an entity's primary record.
    pub(crate) async fn get_record(
        &self,
        kind: RecordKind,
        id: &str,
    ) -> StorageResult<Option<Record>> {
        self.table
            .get(&keys::entity_pk(kind, id), keys::entity_sk(kind))
            .await
    }

    /// Loads an entity by id.
    pub(crate) async fn load<T: Artifact>(&self, id: &str) -> StorageResult<Option<T>> {
        match self.get_record(T::KIND, id).await? {
            Some(record) => Ok(Some(T::from_record(&record)?)),
            None => Ok(None),
        }
    }

    /// Inserts a new entity, assigning its id (when empty) and a fresh
    /// concurrency token. Returns the entity as stored.
    pub(crate) async fn create<T: Artifact>(&self, mut entity: T) -> StorageResult<T> {
        if entity.id().is_empty() {
            entity.set_id(Uuid::new_v4().to_string());
        }
        entity.set_concurrency_token(fresh_token());

        let record = entity.to_record()?;
        match self.table.put(record, PutCondition::NotExists).await {
            Ok(()) => {
                debug!(
                    kind = T::KIND.label(),
                    id = entity.id(),
                    backend = self.table.backend_name(),
                    "created"
                );
                Ok(entity)
            }
            Err(StorageError::ConditionFailed) => {
                Err(StorageError::duplicate_key(T::KIND.label(), entity.id()))
            }
            Err(e) => Err(e),
        }
    }

    /// Rewrites an existing entity conditionally on its concurrency token,
    /// rotating the token on success. Returns the entity as stored.
    pub(crate) async fn update<T: Artifact>(&self, mut entity: T) -> StorageResult<T> {
        if entity.id().is_empty() {
            return Err(StorageError::invalid_argument("id", "must not be empty"));
        }
        let expected = entity.concurrency_token().to_string();
        if expected.is_empty() {
            return Err(StorageError::invalid_argument(
                "concurrency_token",
                "must not be empty",
            ));
        }
        entity.set_concurrency_token(fresh_token());

        let record = entity.to_record()?;
        match self
            .table
            .put(record, PutCondition::TokenEquals(expected))
            .await
        {
            Ok(()) => {
                debug!(
                    kind = T::KIND.label(),
                    id = entity.id(),
                    backend = self.table.backend_name(),
                    "updated"
                );
                Ok(entity)
            }
            Err(StorageError::ConditionFailed) => {
                // Missing record and stale token fail the same condition;
                // one strongly consistent read tells them apart.
                match self.get_record(T::KIND, entity.id()).await? {
                    None => Err(StorageError::not_found(T::KIND.label(), entity.id())),
                    Some(_) => Err(StorageError::concurrency_conflict(
                        T::KIND.label(),
                        entity.id(),
                    )),
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Removes an entity's primary record. Deleting an absent id succeeds;
    /// delete is the one unconditional write in the engine.
    pub(crate) async fn delete(&self, kind: RecordKind, id: &str) -> StorageResult<()> {
        self.table
            .delete(&keys::entity_pk(kind, id), keys::entity_sk(kind))
            .await?;
        debug!(
            kind = kind.label(),
            id,
            backend = self.table.backend_name(),
            "deleted"
        );
        Ok(())
    }
}

//! The contract an entity must satisfy to pass through the engine.

use oxauth_storage::{Record, RecordKind, StorageResult};

/// A persistable entity: identified, versioned, and convertible to/from the
/// generic record shape.
///
/// `to_record` must populate the primary key, the full document, the
/// concurrency token, and the sparse index attributes its kind owns;
/// `from_record` must rebuild the entity from the document alone, so records
/// written by older layouts still decode as long as the document survives.
pub(crate) trait Artifact: Clone + Send + Sync + Sized {
    /// Record kind discriminator for this entity.
    const KIND: RecordKind;

    fn id(&self) -> &str;

    fn set_id(&mut self, id: String);

    fn concurrency_token(&self) -> &str;

    fn set_concurrency_token(&mut self, token: String);

    /// Encodes the entity into its storage record.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRecord` when the entity cannot be serialized.
    fn to_record(&self) -> StorageResult<Record>;

    /// Decodes an entity from its storage record.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRecord` when the stored document is missing or
    /// malformed.
    fn from_record(record: &Record) -> StorageResult<Self>;
}

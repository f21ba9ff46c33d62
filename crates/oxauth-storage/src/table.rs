//! The `KeyValueTable` trait all storage backends implement.
//!
//! The operation set is deliberately closed: point reads, conditional
//! single-item writes, index queries, filtered scans, and batch point
//! reads. There is no expression language and no multi-item transaction;
//! everything richer is built on top by the engine in `oxauth-stores`.

use async_trait::async_trait;

use crate::cursor::Cursor;
use crate::error::StorageResult;
use crate::record::{Record, RecordKind};

/// Condition attached to a put.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PutCondition {
    /// Unconditional write.
    None,
    /// The primary key must not exist yet (create).
    NotExists,
    /// The record must exist and its stored concurrency token must equal
    /// the given value (optimistic update).
    TokenEquals(String),
}

/// Sort/range-key condition of a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeCondition {
    /// Exact match on the range attribute.
    Equals {
        /// Range attribute name.
        attribute: String,
        /// Value to match exactly.
        value: String,
    },
    /// Prefix match on the range attribute.
    BeginsWith {
        /// Range attribute name.
        attribute: String,
        /// Prefix to match.
        prefix: String,
    },
}

/// A query against the primary key or a secondary index.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    /// Canonical index name, or `None` for a primary-partition query.
    pub index: Option<String>,
    /// Hash key attribute name.
    pub hash_attr: String,
    /// Hash key value (exact match).
    pub hash_value: String,
    /// Optional range-key condition.
    pub range: Option<RangeCondition>,
    /// Maximum number of records per page.
    pub limit: Option<usize>,
    /// Continuation cursor from a previous page.
    pub start: Option<Cursor>,
}

impl QueryRequest {
    /// Creates a primary-partition query (strongly consistent).
    #[must_use]
    pub fn partition(pk: impl Into<String>) -> Self {
        Self {
            index: None,
            hash_attr: crate::schema::ATTR_PK.to_string(),
            hash_value: pk.into(),
            range: None,
            limit: None,
            start: None,
        }
    }

    /// Creates a secondary-index query (eventually consistent).
    #[must_use]
    pub fn index(
        name: impl Into<String>,
        hash_attr: impl Into<String>,
        hash_value: impl Into<String>,
    ) -> Self {
        Self {
            index: Some(name.into()),
            hash_attr: hash_attr.into(),
            hash_value: hash_value.into(),
            range: None,
            limit: None,
            start: None,
        }
    }

    /// Adds an exact range-key condition.
    #[must_use]
    pub fn with_range_eq(mut self, attribute: impl Into<String>, value: impl Into<String>) -> Self {
        self.range = Some(RangeCondition::Equals {
            attribute: attribute.into(),
            value: value.into(),
        });
        self
    }

    /// Adds a prefix range-key condition.
    #[must_use]
    pub fn with_range_prefix(
        mut self,
        attribute: impl Into<String>,
        prefix: impl Into<String>,
    ) -> Self {
        self.range = Some(RangeCondition::BeginsWith {
            attribute: attribute.into(),
            prefix: prefix.into(),
        });
        self
    }

    /// Caps the page size.
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Resumes from a continuation cursor.
    #[must_use]
    pub fn with_start(mut self, start: Option<Cursor>) -> Self {
        self.start = start;
        self
    }
}

/// A filtered scan over the whole keyspace. The only supported filter is
/// the kind discriminator; scans exist for full listings and retention
/// sweeps, not for ad-hoc querying.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanRequest {
    /// Restricts the scan to records of one kind.
    pub kind: Option<RecordKind>,
    /// Maximum number of records per page.
    pub limit: Option<usize>,
    /// Continuation cursor from a previous page.
    pub start: Option<Cursor>,
}

impl ScanRequest {
    /// Creates a scan over all records of one kind.
    #[must_use]
    pub fn of_kind(kind: RecordKind) -> Self {
        Self {
            kind: Some(kind),
            limit: None,
            start: None,
        }
    }

    /// Caps the page size.
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Resumes from a continuation cursor.
    #[must_use]
    pub fn with_start(mut self, start: Option<Cursor>) -> Self {
        self.start = start;
        self
    }
}

/// One page of query or scan results.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordPage {
    /// Records in this page.
    pub records: Vec<Record>,
    /// Continuation cursor, absent when the result set is exhausted.
    pub next: Option<Cursor>,
}

impl RecordPage {
    /// An empty, exhausted page.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            records: Vec::new(),
            next: None,
        }
    }
}

/// A partitioned key-value table with shared secondary indexes.
///
/// Implementations must be thread-safe; every method is an I/O-bound call
/// to the underlying store and blocks on nothing else. Primary-key reads
/// are strongly consistent; index queries may lag writes.
#[async_trait]
pub trait KeyValueTable: Send + Sync {
    /// Reads one record by primary key. Returns `None` when absent.
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure failures, never for a
    /// missing record.
    async fn get(&self, pk: &str, sk: &str) -> StorageResult<Option<Record>>;

    /// Writes one record, subject to the given condition.
    ///
    /// # Errors
    ///
    /// Returns `ConditionFailed` when the condition does not hold; the
    /// caller classifies that into its public error. Other errors are
    /// infrastructure failures.
    async fn put(&self, record: Record, condition: PutCondition) -> StorageResult<()>;

    /// Deletes one record by primary key. Deleting an absent key succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure failures.
    async fn delete(&self, pk: &str, sk: &str) -> StorageResult<()>;

    /// Runs one page of a query.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for a malformed cursor, otherwise only
    /// infrastructure failures. An empty page is not an error.
    async fn query(&self, request: QueryRequest) -> StorageResult<RecordPage>;

    /// Runs one page of a filtered scan.
    ///
    /// # Errors
    ///
    /// As for [`KeyValueTable::query`].
    async fn scan(&self, request: ScanRequest) -> StorageResult<RecordPage>;

    /// Reads many records by primary key. Missing keys are skipped; the
    /// result order is unspecified.
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure failures.
    async fn batch_get(&self, keys: &[(String, String)]) -> StorageResult<Vec<Record>>;

    /// Returns the name of this backend for logging/debugging.
    fn backend_name(&self) -> &'static str;
}

// Compile-time check that the trait stays object-safe: the engine holds
// backends as `Arc<dyn KeyValueTable>`.
#[cfg(test)]
mod tests {
    use super::*;

    fn _assert_object_safe(_: &dyn KeyValueTable) {}

    #[test]
    fn test_query_builders() {
        let query = QueryRequest::partition("APPLICATION#1").with_limit(5);
        assert_eq!(query.index, None);
        assert_eq!(query.hash_attr, "PK");
        assert_eq!(query.limit, Some(5));

        let query = QueryRequest::index("Subject-index", "Subject", "alice")
            .with_range_eq("SK", "AUTHORIZATION");
        assert_eq!(query.index.as_deref(), Some("Subject-index"));
        assert!(matches!(query.range, Some(RangeCondition::Equals { .. })));
    }

    #[test]
    fn test_scan_builder() {
        let scan = ScanRequest::of_kind(RecordKind::Token).with_limit(10);
        assert_eq!(scan.kind, Some(RecordKind::Token));
        assert_eq!(scan.limit, Some(10));
        assert!(scan.start.is_none());
    }
}

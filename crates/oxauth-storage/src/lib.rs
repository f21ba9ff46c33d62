//! Key-value substrate boundary for the OxAuth persistence engine.
//!
//! The target store is a schema-less, horizontally partitioned key-value
//! table (Amazon DynamoDB or an equivalent) that offers only:
//!
//! - strongly consistent point reads on a `(PK, SK)` primary key
//! - conditional single-item writes
//! - eventually consistent queries against a small fixed set of shared
//!   secondary indexes, paged by forward-only continuation cursors
//! - filtered scans over the whole keyspace
//!
//! This crate defines that boundary: the [`KeyValueTable`] trait backends
//! implement, the tagged-union [`Record`] row type with its sparse
//! attribute set, the deterministic key schema, the shared-index
//! declaration, the opaque [`Cursor`] continuation token, and the
//! [`StorageError`] taxonomy. The engine in `oxauth-stores` is written
//! entirely against these types; backends live in `oxauth-db-memory` and
//! `oxauth-db-dynamo`.

pub mod cursor;
pub mod error;
pub mod keys;
pub mod record;
pub mod schema;
pub mod table;

pub use cursor::Cursor;
pub use error::{ErrorCategory, StorageError, StorageResult};
pub use keys::RedirectKind;
pub use record::{Record, RecordKind};
pub use schema::{BillingMode, IndexDef, TableOptions};
pub use table::{KeyValueTable, PutCondition, QueryRequest, RangeCondition, RecordPage, ScanRequest};

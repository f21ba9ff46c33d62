//! In-memory key-value backend.
//!
//! Implements [`KeyValueTable`](oxauth_storage::KeyValueTable) with the same observable semantics as the
//! DynamoDB backend: conditional single-item writes, shared secondary
//! indexes with range-key ordering, and forward-only continuation cursors.
//! The page limit is configurable so tests can force multi-page traversal
//! with small data sets.

mod table;

pub use table::InMemoryTable;

//! Amazon DynamoDB key-value backend.
//!
//! Maps the generic record shape onto native DynamoDB items: conditional
//! single-item writes become condition expressions, index queries run
//! against the shared global secondary indexes, and continuation cursors
//! wrap `LastEvaluatedKey`. [`DynamoTable::ensure_table`] provisions the
//! table and its index shape idempotently at startup.

mod config;
mod convert;
mod provision;
mod table;

pub use config::DynamoConfig;
pub use table::DynamoTable;

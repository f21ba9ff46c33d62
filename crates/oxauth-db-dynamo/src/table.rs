//! The DynamoDB [`KeyValueTable`] implementation.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::error::SdkError;
use aws_sdk_dynamodb::operation::put_item::PutItemError;
use aws_sdk_dynamodb::types::{AttributeValue, KeysAndAttributes};
use aws_smithy_types::timeout::TimeoutConfig;
use tracing::debug;

use oxauth_storage::schema::{ATTR_CONCURRENCY_TOKEN, ATTR_KIND, ATTR_PK, ATTR_SK};
use oxauth_storage::{
    KeyValueTable, PutCondition, QueryRequest, RangeCondition, Record, RecordPage, ScanRequest,
    StorageError, StorageResult, TableOptions,
};

use crate::config::DynamoConfig;
use crate::convert::{cursor_to_key, item_to_record, key_to_cursor, record_to_item};
use crate::provision;

/// DynamoDB largest allowed batch-get size.
const BATCH_GET_CHUNK: usize = 100;

/// Base delay before retrying unprocessed batch-get keys; grows linearly
/// per attempt.
const BATCH_GET_RETRY_DELAY: Duration = Duration::from_millis(50);

/// Retries of unprocessed batch-get keys before giving up.
const BATCH_GET_MAX_RETRIES: u32 = 5;

/// A [`KeyValueTable`] over one DynamoDB table.
#[derive(Clone)]
pub struct DynamoTable {
    client: Client,
    options: TableOptions,
}

impl std::fmt::Debug for DynamoTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamoTable")
            .field("table_name", &self.options.table_name)
            .finish()
    }
}

impl DynamoTable {
    /// Creates a backend from the shared SDK configuration, applying the
    /// per-backend overrides (region, endpoint, timeout). Inheriting from
    /// `SdkConfig` preserves the host's HTTP client, credentials, and retry
    /// policy.
    #[must_use]
    pub fn new(sdk_config: &aws_config::SdkConfig, config: DynamoConfig) -> Self {
        let mut builder = aws_sdk_dynamodb::config::Builder::from(sdk_config);
        if let Some(region) = config.region {
            builder = builder.region(aws_sdk_dynamodb::config::Region::new(region));
        }
        if let Some(endpoint) = config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }
        if let Some(timeout_ms) = config.timeout_ms {
            builder = builder.timeout_config(
                TimeoutConfig::builder()
                    .operation_timeout(Duration::from_millis(timeout_ms))
                    .build(),
            );
        }
        Self {
            client: Client::from_conf(builder.build()),
            options: config.table,
        }
    }

    /// Creates a backend from a pre-built client (tests, DynamoDB Local).
    #[must_use]
    pub fn from_client(client: Client, options: TableOptions) -> Self {
        Self { client, options }
    }

    /// Returns the naming configuration this backend runs with.
    #[must_use]
    pub fn options(&self) -> &TableOptions {
        &self.options
    }

    /// Provisions the table and its secondary index shape, idempotently:
    /// creates the table with every index when missing, adds only the
    /// missing indexes when present, and leaves an already-complete table
    /// untouched. Waits for the table and indexes to become active.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` when a provisioning call fails or the table
    /// does not become active in time.
    pub async fn ensure_table(&self) -> StorageResult<()> {
        provision::ensure_table(&self.client, &self.options).await
    }

    fn is_put_conditional_check_failed(err: &SdkError<PutItemError>) -> bool {
        err.as_service_error()
            .is_some_and(|service_err| {
                matches!(service_err, PutItemError::ConditionalCheckFailedException(_))
            })
    }

    fn string_key(pk: &str, sk: &str) -> HashMap<String, AttributeValue> {
        HashMap::from([
            (ATTR_PK.to_string(), AttributeValue::S(pk.to_string())),
            (ATTR_SK.to_string(), AttributeValue::S(sk.to_string())),
        ])
    }

    fn clamp_limit(limit: usize) -> i32 {
        i32::try_from(limit).unwrap_or(i32::MAX)
    }

    /// Backoff before the given unprocessed-keys retry, or `None` once the
    /// retry budget is spent.
    fn batch_retry_delay(attempt: u32) -> Option<Duration> {
        (attempt <= BATCH_GET_MAX_RETRIES).then(|| BATCH_GET_RETRY_DELAY * attempt)
    }
}

#[async_trait]
impl KeyValueTable for DynamoTable {
    async fn get(&self, pk: &str, sk: &str) -> StorageResult<Option<Record>> {
        let response = self
            .client
            .get_item()
            .table_name(&self.options.table_name)
            .set_key(Some(Self::string_key(pk, sk)))
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| StorageError::unavailable(format!("DynamoDB GetItem failed: {e}")))?;
        match response.item() {
            Some(item) => Ok(Some(item_to_record(item)?)),
            None => Ok(None),
        }
    }

    async fn put(&self, record: Record, condition: PutCondition) -> StorageResult<()> {
        let mut request = self
            .client
            .put_item()
            .table_name(&self.options.table_name)
            .set_item(Some(record_to_item(&record)));
        match condition {
            PutCondition::None => {}
            PutCondition::NotExists => {
                request = request
                    .condition_expression("attribute_not_exists(#pk)")
                    .expression_attribute_names("#pk", ATTR_PK);
            }
            PutCondition::TokenEquals(expected) => {
                request = request
                    .condition_expression("attribute_exists(#pk) AND #ct = :expected")
                    .expression_attribute_names("#pk", ATTR_PK)
                    .expression_attribute_names("#ct", ATTR_CONCURRENCY_TOKEN)
                    .expression_attribute_values(":expected", AttributeValue::S(expected));
            }
        }
        match request.send().await {
            Ok(_) => Ok(()),
            Err(e) if Self::is_put_conditional_check_failed(&e) => {
                Err(StorageError::ConditionFailed)
            }
            Err(e) => Err(StorageError::unavailable(format!(
                "DynamoDB PutItem failed: {e}"
            ))),
        }
    }

    async fn delete(&self, pk: &str, sk: &str) -> StorageResult<()> {
        self.client
            .delete_item()
            .table_name(&self.options.table_name)
            .set_key(Some(Self::string_key(pk, sk)))
            .send()
            .await
            .map_err(|e| StorageError::unavailable(format!("DynamoDB DeleteItem failed: {e}")))?;
        Ok(())
    }

    async fn query(&self, request: QueryRequest) -> StorageResult<RecordPage> {
        let key_condition = match &request.range {
            None => "#hk = :hv",
            Some(RangeCondition::Equals { .. }) => "#hk = :hv AND #rk = :rv",
            Some(RangeCondition::BeginsWith { .. }) => "#hk = :hv AND begins_with(#rk, :rp)",
        };
        let mut builder = self
            .client
            .query()
            .table_name(&self.options.table_name)
            .key_condition_expression(key_condition)
            .expression_attribute_names("#hk", &request.hash_attr)
            .expression_attribute_values(":hv", AttributeValue::S(request.hash_value.clone()));
        match &request.range {
            None => {}
            Some(RangeCondition::Equals { attribute, value }) => {
                builder = builder
                    .expression_attribute_names("#rk", attribute)
                    .expression_attribute_values(":rv", AttributeValue::S(value.clone()));
            }
            Some(RangeCondition::BeginsWith { attribute, prefix }) => {
                builder = builder
                    .expression_attribute_names("#rk", attribute)
                    .expression_attribute_values(":rp", AttributeValue::S(prefix.clone()));
            }
        }
        match &request.index {
            // Index reads are eventually consistent; DynamoDB rejects
            // consistent reads on a GSI.
            Some(index) => builder = builder.index_name(self.options.index_name(index)),
            None => builder = builder.consistent_read(true),
        }
        if let Some(limit) = request.limit {
            builder = builder.limit(Self::clamp_limit(limit));
        }
        if let Some(start) = &request.start {
            builder = builder.set_exclusive_start_key(Some(cursor_to_key(start)?));
        }

        let response = builder
            .send()
            .await
            .map_err(|e| StorageError::unavailable(format!("DynamoDB Query failed: {e}")))?;
        let records = response
            .items()
            .iter()
            .map(item_to_record)
            .collect::<StorageResult<Vec<_>>>()?;
        let next = match response.last_evaluated_key() {
            Some(key) if !key.is_empty() => Some(key_to_cursor(key)),
            _ => None,
        };
        debug!(
            table = self.options.table_name.as_str(),
            index = request.index.as_deref().unwrap_or("primary"),
            records = records.len(),
            "query page"
        );
        Ok(RecordPage { records, next })
    }

    async fn scan(&self, request: ScanRequest) -> StorageResult<RecordPage> {
        let mut builder = self.client.scan().table_name(&self.options.table_name);
        if let Some(kind) = request.kind {
            builder = builder
                .filter_expression("#kind = :kind")
                .expression_attribute_names("#kind", ATTR_KIND)
                .expression_attribute_values(":kind", AttributeValue::S(kind.as_str().to_string()));
        }
        if let Some(limit) = request.limit {
            builder = builder.limit(Self::clamp_limit(limit));
        }
        if let Some(start) = &request.start {
            builder = builder.set_exclusive_start_key(Some(cursor_to_key(start)?));
        }

        let response = builder
            .send()
            .await
            .map_err(|e| StorageError::unavailable(format!("DynamoDB Scan failed: {e}")))?;
        let records = response
            .items()
            .iter()
            .map(item_to_record)
            .collect::<StorageResult<Vec<_>>>()?;
        let next = match response.last_evaluated_key() {
            Some(key) if !key.is_empty() => Some(key_to_cursor(key)),
            _ => None,
        };
        Ok(RecordPage { records, next })
    }

    async fn batch_get(&self, keys: &[(String, String)]) -> StorageResult<Vec<Record>> {
        let mut records = Vec::new();
        for chunk in keys.chunks(BATCH_GET_CHUNK) {
            let mut pending: Vec<HashMap<String, AttributeValue>> = chunk
                .iter()
                .map(|(pk, sk)| Self::string_key(pk, sk))
                .collect();
            // DynamoDB may return a subset and hand the rest back as
            // unprocessed keys; those are retried with a growing backoff,
            // bounded so a throttled table surfaces as an error instead of
            // a hot loop.
            let mut attempt = 0u32;
            while !pending.is_empty() {
                if attempt > 0 {
                    match Self::batch_retry_delay(attempt) {
                        Some(delay) => tokio::time::sleep(delay).await,
                        None => {
                            return Err(StorageError::unavailable(format!(
                                "DynamoDB BatchGetItem still returning unprocessed keys \
                                 after {BATCH_GET_MAX_RETRIES} retries"
                            )));
                        }
                    }
                }
                let request_keys = KeysAndAttributes::builder()
                    .set_keys(Some(std::mem::take(&mut pending)))
                    .build()
                    .map_err(|e| {
                        StorageError::unavailable(format!("invalid batch-get request: {e}"))
                    })?;
                let response = self
                    .client
                    .batch_get_item()
                    .request_items(self.options.table_name.clone(), request_keys)
                    .send()
                    .await
                    .map_err(|e| {
                        StorageError::unavailable(format!("DynamoDB BatchGetItem failed: {e}"))
                    })?;
                if let Some(responses) = response.responses()
                    && let Some(items) = responses.get(&self.options.table_name)
                {
                    for item in items {
                        records.push(item_to_record(item)?);
                    }
                }
                if let Some(unprocessed) = response.unprocessed_keys()
                    && let Some(remainder) = unprocessed.get(&self.options.table_name)
                {
                    pending = remainder.keys().to_vec();
                }
                attempt += 1;
            }
        }
        Ok(records)
    }

    fn backend_name(&self) -> &'static str {
        "dynamodb"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_retry_backoff_grows_then_stops() {
        assert_eq!(
            DynamoTable::batch_retry_delay(1),
            Some(BATCH_GET_RETRY_DELAY)
        );
        assert_eq!(
            DynamoTable::batch_retry_delay(2),
            Some(BATCH_GET_RETRY_DELAY * 2)
        );
        assert_eq!(
            DynamoTable::batch_retry_delay(BATCH_GET_MAX_RETRIES),
            Some(BATCH_GET_RETRY_DELAY * BATCH_GET_MAX_RETRIES)
        );
        assert_eq!(DynamoTable::batch_retry_delay(BATCH_GET_MAX_RETRIES + 1), None);
    }
}

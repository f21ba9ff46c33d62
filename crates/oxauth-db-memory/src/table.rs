use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use oxauth_storage::schema::{self, ATTR_CONCURRENCY_TOKEN, ATTR_PK, ATTR_SK};
use oxauth_storage::{
    Cursor, KeyValueTable, PutCondition, QueryRequest, RangeCondition, Record, RecordPage,
    ScanRequest, StorageError, StorageResult,
};

/// Default page limit, standing in for DynamoDB's 1 MB response cap.
const DEFAULT_PAGE_LIMIT: usize = 1000;

type PrimaryKey = (String, String);

/// In-memory [`KeyValueTable`] backend.
///
/// Rows live in a `BTreeMap` ordered by `(PK, SK)`; index queries sort
/// matches by the index range key the way a global secondary index would.
/// Continuation cursors carry the last evaluated key and resume by order
/// comparison, so they stay valid across concurrent inserts and deletes.
#[derive(Debug, Clone)]
pub struct InMemoryTable {
    rows: Arc<RwLock<BTreeMap<PrimaryKey, Record>>>,
    page_limit: usize,
}

impl InMemoryTable {
    /// Creates an empty table with the default page limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_page_limit(DEFAULT_PAGE_LIMIT)
    }

    /// Creates an empty table that returns at most `page_limit` records per
    /// query/scan page. Tests use a small limit to force multi-page
    /// traversal with small data sets.
    #[must_use]
    pub fn with_page_limit(page_limit: usize) -> Self {
        Self {
            rows: Arc::new(RwLock::new(BTreeMap::new())),
            page_limit: page_limit.max(1),
        }
    }

    /// Returns the number of stored records (all kinds, projections
    /// included).
    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    /// Returns `true` when the table holds no records.
    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }

    /// Returns the textual value of a key or attribute on a record.
    fn attr_text(record: &Record, name: &str) -> Option<String> {
        match name {
            n if n == ATTR_PK => Some(record.pk.clone()),
            n if n == ATTR_SK => Some(record.sk.clone()),
            _ => record.get_str(name).map(str::to_string),
        }
    }

    /// Sort key used to order matches and resume from cursors:
    /// (range attribute value, PK, SK).
    fn order_key(record: &Record, range_attr: Option<&str>) -> (String, String, String) {
        let range = range_attr
            .and_then(|attr| Self::attr_text(record, attr))
            .unwrap_or_default();
        (range, record.pk.clone(), record.sk.clone())
    }

    fn encode_cursor(record: &Record, range_attr: Option<&str>) -> Cursor {
        let mut key = Map::new();
        key.insert(ATTR_PK.to_string(), Value::String(record.pk.clone()));
        key.insert(ATTR_SK.to_string(), Value::String(record.sk.clone()));
        if let Some(attr) = range_attr
            && attr != ATTR_PK
            && attr != ATTR_SK
            && let Some(value) = Self::attr_text(record, attr)
        {
            key.insert(attr.to_string(), Value::String(value));
        }
        Cursor::encode(&key)
    }

    fn decode_cursor(
        cursor: &Cursor,
        range_attr: Option<&str>,
    ) -> StorageResult<(String, String, String)> {
        let key = cursor.decode()?;
        let text = |name: &str| -> StorageResult<String> {
            key.get(name)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| {
                    StorageError::invalid_argument("cursor", "malformed continuation token")
                })
        };
        let pk = text(ATTR_PK)?;
        let sk = text(ATTR_SK)?;
        let range = match range_attr {
            Some(attr) if attr == ATTR_PK => pk.clone(),
            Some(attr) if attr == ATTR_SK => sk.clone(),
            Some(attr) => key
                .get(attr)
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_default(),
            None => String::new(),
        };
        Ok((range, pk, sk))
    }

    /// Pages an ordered match list: resumes past the cursor position and
    /// cuts one page, emitting a continuation cursor when matches remain.
    fn cut_page(
        mut matches: Vec<Record>,
        range_attr: Option<&str>,
        limit: Option<usize>,
        start: Option<&Cursor>,
        page_limit: usize,
    ) -> StorageResult<RecordPage> {
        matches.sort_by_key(|record| Self::order_key(record, range_attr));

        let skip = match start {
            None => 0,
            Some(cursor) => {
                let after = Self::decode_cursor(cursor, range_attr)?;
                matches
                    .iter()
                    .take_while(|record| Self::order_key(record, range_attr) <= after)
                    .count()
            }
        };

        let page_size = limit.unwrap_or(usize::MAX).min(page_limit).max(1);
        let remaining = matches.len().saturating_sub(skip);
        let records: Vec<Record> = matches.into_iter().skip(skip).take(page_size).collect();
        let next = if remaining > records.len() {
            records
                .last()
                .map(|record| Self::encode_cursor(record, range_attr))
        } else {
            None
        };
        Ok(RecordPage { records, next })
    }
}

impl Default for InMemoryTable {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueTable for InMemoryTable {
    async fn get(&self, pk: &str, sk: &str) -> StorageResult<Option<Record>> {
        let rows = self.rows.read().await;
        Ok(rows.get(&(pk.to_string(), sk.to_string())).cloned())
    }

    async fn put(&self, record: Record, condition: PutCondition) -> StorageResult<()> {
        let key = (record.pk.clone(), record.sk.clone());
        let mut rows = self.rows.write().await;
        match condition {
            PutCondition::None => {}
            PutCondition::NotExists => {
                if rows.contains_key(&key) {
                    return Err(StorageError::ConditionFailed);
                }
            }
            PutCondition::TokenEquals(expected) => match rows.get(&key) {
                Some(existing)
                    if existing.get_str(ATTR_CONCURRENCY_TOKEN) == Some(expected.as_str()) => {}
                _ => return Err(StorageError::ConditionFailed),
            },
        }
        rows.insert(key, record);
        Ok(())
    }

    async fn delete(&self, pk: &str, sk: &str) -> StorageResult<()> {
        let mut rows = self.rows.write().await;
        rows.remove(&(pk.to_string(), sk.to_string()));
        Ok(())
    }

    async fn query(&self, request: QueryRequest) -> StorageResult<RecordPage> {
        let range_attr = match &request.index {
            None => Some(ATTR_SK),
            Some(name) => {
                let def = schema::index_def(name).ok_or_else(|| {
                    StorageError::unsupported_operation(format!("unknown index `{name}`"))
                })?;
                def.range_key
            }
        };

        let rows = self.rows.read().await;
        let matches: Vec<Record> = rows
            .values()
            .filter(|record| {
                Self::attr_text(record, &request.hash_attr).as_deref()
                    == Some(request.hash_value.as_str())
            })
            .filter(|record| match &request.range {
                None => true,
                Some(RangeCondition::Equals { attribute, value }) => {
                    Self::attr_text(record, attribute).as_deref() == Some(value.as_str())
                }
                Some(RangeCondition::BeginsWith { attribute, prefix }) => {
                    Self::attr_text(record, attribute)
                        .is_some_and(|text| text.starts_with(prefix.as_str()))
                }
            })
            .cloned()
            .collect();
        drop(rows);

        Self::cut_page(
            matches,
            range_attr,
            request.limit,
            request.start.as_ref(),
            self.page_limit,
        )
    }

    async fn scan(&self, request: ScanRequest) -> StorageResult<RecordPage> {
        let rows = self.rows.read().await;
        let matches: Vec<Record> = rows
            .values()
            .filter(|record| match request.kind {
                None => true,
                Some(kind) => record.kind() == Some(kind),
            })
            .cloned()
            .collect();
        drop(rows);

        Self::cut_page(
            matches,
            None,
            request.limit,
            request.start.as_ref(),
            self.page_limit,
        )
    }

    async fn batch_get(&self, keys: &[(String, String)]) -> StorageResult<Vec<Record>> {
        let rows = self.rows.read().await;
        Ok(keys.iter().filter_map(|key| rows.get(key).cloned()).collect())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxauth_storage::RecordKind;
    use oxauth_storage::schema::{ATTR_SUBJECT, index};

    fn token_record(id: &str, subject: &str) -> Record {
        let mut record = Record::new(format!("TOKEN#{id}"), "TOKEN", RecordKind::Token);
        record.set_str(ATTR_CONCURRENCY_TOKEN, "v1");
        record.set_sparse_str(ATTR_SUBJECT, subject);
        record
    }

    #[tokio::test]
    async fn test_get_put_delete() {
        let table = InMemoryTable::new();
        assert!(table.get("TOKEN#1", "TOKEN").await.unwrap().is_none());

        table
            .put(token_record("1", "alice"), PutCondition::None)
            .await
            .unwrap();
        let stored = table.get("TOKEN#1", "TOKEN").await.unwrap().unwrap();
        assert_eq!(stored.get_str(ATTR_SUBJECT), Some("alice"));

        table.delete("TOKEN#1", "TOKEN").await.unwrap();
        assert!(table.get("TOKEN#1", "TOKEN").await.unwrap().is_none());
        // Deleting an absent key is not an error.
        table.delete("TOKEN#1", "TOKEN").await.unwrap();
    }

    #[tokio::test]
    async fn test_conditional_put_not_exists() {
        let table = InMemoryTable::new();
        table
            .put(token_record("1", "alice"), PutCondition::NotExists)
            .await
            .unwrap();
        let err = table
            .put(token_record("1", "alice"), PutCondition::NotExists)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::ConditionFailed));
    }

    #[tokio::test]
    async fn test_conditional_put_token_equals() {
        let table = InMemoryTable::new();
        table
            .put(token_record("1", "alice"), PutCondition::None)
            .await
            .unwrap();

        // Matching token succeeds.
        let mut updated = token_record("1", "alice");
        updated.set_str(ATTR_CONCURRENCY_TOKEN, "v2");
        table
            .put(updated, PutCondition::TokenEquals("v1".to_string()))
            .await
            .unwrap();

        // Stale token fails, record unchanged.
        let err = table
            .put(
                token_record("1", "alice"),
                PutCondition::TokenEquals("v1".to_string()),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::ConditionFailed));
        let stored = table.get("TOKEN#1", "TOKEN").await.unwrap().unwrap();
        assert_eq!(stored.get_str(ATTR_CONCURRENCY_TOKEN), Some("v2"));

        // Missing record fails too.
        let err = table
            .put(
                token_record("9", "alice"),
                PutCondition::TokenEquals("v1".to_string()),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::ConditionFailed));
    }

    #[tokio::test]
    async fn test_index_query_with_paging() {
        let table = InMemoryTable::with_page_limit(2);
        for i in 0..5 {
            table
                .put(token_record(&i.to_string(), "alice"), PutCondition::None)
                .await
                .unwrap();
        }
        table
            .put(token_record("other", "bob"), PutCondition::None)
            .await
            .unwrap();

        let request = QueryRequest::index(index::SUBJECT, ATTR_SUBJECT, "alice");
        let mut seen = Vec::new();
        let mut start = None;
        loop {
            let page = table
                .query(request.clone().with_start(start.take()))
                .await
                .unwrap();
            assert!(page.records.len() <= 2);
            seen.extend(page.records);
            match page.next {
                Some(next) => start = Some(next),
                None => break,
            }
        }
        assert_eq!(seen.len(), 5);
        assert!(seen.iter().all(|r| r.get_str(ATTR_SUBJECT) == Some("alice")));
    }

    #[tokio::test]
    async fn test_partition_query_range_prefix() {
        let table = InMemoryTable::new();
        let mut a = Record::new("REDIRECT#https://a/x", "REDIRECT#app-1", RecordKind::RedirectProjection);
        a.set_str(ATTR_CONCURRENCY_TOKEN, "v1");
        let mut b = Record::new(
            "REDIRECT#https://a/x",
            "POSTLOGOUT#app-2",
            RecordKind::RedirectProjection,
        );
        b.set_str(ATTR_CONCURRENCY_TOKEN, "v1");
        table.put(a, PutCondition::None).await.unwrap();
        table.put(b, PutCondition::None).await.unwrap();

        let page = table
            .query(
                QueryRequest::partition("REDIRECT#https://a/x")
                    .with_range_prefix(ATTR_SK, "REDIRECT#"),
            )
            .await
            .unwrap();
        assert_eq!(page.records.len(), 1);
        assert_eq!(page.records[0].sk, "REDIRECT#app-1");
    }

    #[tokio::test]
    async fn test_scan_filters_by_kind() {
        let table = InMemoryTable::new();
        table
            .put(token_record("1", "alice"), PutCondition::None)
            .await
            .unwrap();
        let mut scope = Record::new("SCOPE#1", "SCOPE", RecordKind::Scope);
        scope.set_str(ATTR_CONCURRENCY_TOKEN, "v1");
        table.put(scope, PutCondition::None).await.unwrap();

        let page = table.scan(ScanRequest::of_kind(RecordKind::Scope)).await.unwrap();
        assert_eq!(page.records.len(), 1);
        assert_eq!(page.records[0].kind(), Some(RecordKind::Scope));
        assert!(page.next.is_none());
    }

    #[tokio::test]
    async fn test_cursor_survives_deletion_of_last_evaluated() {
        let table = InMemoryTable::with_page_limit(2);
        for i in 0..4 {
            table
                .put(token_record(&format!("{i}"), "alice"), PutCondition::None)
                .await
                .unwrap();
        }
        let first = table
            .query(QueryRequest::index(index::SUBJECT, ATTR_SUBJECT, "alice"))
            .await
            .unwrap();
        assert_eq!(first.records.len(), 2);
        let cursor = first.next.clone().unwrap();

        // Remove the record the cursor points at; the resume position is
        // order-based so the remainder is still returned exactly once.
        let last = first.records.last().unwrap();
        table.delete(&last.pk, &last.sk).await.unwrap();

        let second = table
            .query(QueryRequest::index(index::SUBJECT, ATTR_SUBJECT, "alice").with_start(Some(cursor)))
            .await
            .unwrap();
        assert_eq!(second.records.len(), 2);
        assert!(second.next.is_none());
    }

    #[tokio::test]
    async fn test_batch_get_skips_missing() {
        let table = InMemoryTable::new();
        table
            .put(token_record("1", "alice"), PutCondition::None)
            .await
            .unwrap();
        let records = table
            .batch_get(&[
                ("TOKEN#1".to_string(), "TOKEN".to_string()),
                ("TOKEN#2".to_string(), "TOKEN".to_string()),
            ])
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
    }
}

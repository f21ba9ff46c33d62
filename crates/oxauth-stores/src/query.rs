//! Lookup plumbing shared by the entity stores.
//!
//! The query surface is closed: every public lookup maps onto one of the
//! fixed secondary indexes, a primary-partition query, or a kind-filtered
//! scan. Several indexes are shared across entity kinds, so every reader
//! here filters on the kind discriminator before decoding. Multi-record
//! results are lazy streams; an empty result is never an error.

use std::sync::Arc;

use futures_util::future;
use futures_util::stream::{self, BoxStream, StreamExt};

use oxauth_storage::keys;
use oxauth_storage::{
    KeyValueTable, QueryRequest, Record, RecordKind, ScanRequest, StorageError, StorageResult,
};

use crate::artifact::Artifact;
use crate::pager::{PageFetcher, list_records};

/// Fails fast when a required identifier argument is empty.
pub(crate) fn require_arg(parameter: &'static str, value: &str) -> StorageResult<()> {
    if value.trim().is_empty() {
        Err(StorageError::invalid_argument(
            parameter,
            "must not be empty",
        ))
    } else {
        Ok(())
    }
}

/// A stream that yields a single error. Used when argument validation fails
/// before any fetch is issued.
pub(crate) fn err_stream<T: Send + 'static>(
    err: StorageError,
) -> BoxStream<'static, StorageResult<T>> {
    stream::once(future::ready(Err(err))).boxed()
}

/// Defers a batched lookup behind a stream: the future runs on first poll
/// and its items (or its error) are yielded one by one.
pub(crate) fn deferred_stream<T, Fut>(future: Fut) -> BoxStream<'static, StorageResult<T>>
where
    T: Send + 'static,
    Fut: std::future::Future<Output = StorageResult<Vec<T>>> + Send + 'static,
{
    stream::once(future)
        .map(|result| match result {
            Ok(items) => stream::iter(items.into_iter().map(Ok)).boxed(),
            Err(err) => err_stream(err),
        })
        .flatten()
        .boxed()
}

/// Drains every page of a query into memory.
pub(crate) async fn collect_records(
    table: &dyn KeyValueTable,
    request: QueryRequest,
) -> StorageResult<Vec<Record>> {
    let mut records = Vec::new();
    let mut start = None;
    loop {
        let page = table.query(request.clone().with_start(start.take())).await?;
        records.extend(page.records);
        match page.next {
            Some(next) => start = Some(next),
            None => return Ok(records),
        }
    }
}

/// Counts the records of one kind by draining a filtered scan.
pub(crate) async fn count_kind(
    table: &dyn KeyValueTable,
    kind: RecordKind,
) -> StorageResult<usize> {
    let mut total = 0;
    let mut start = None;
    loop {
        let page = table
            .scan(ScanRequest::of_kind(kind).with_start(start.take()))
            .await?;
        total += page.records.len();
        match page.next {
            Some(next) => start = Some(next),
            None => return Ok(total),
        }
    }
}

/// Resolves a unique alternate-key lookup: first record of the expected
/// kind wins, absence is `None`.
pub(crate) async fn find_unique<T: Artifact>(
    table: &dyn KeyValueTable,
    request: QueryRequest,
) -> StorageResult<Option<T>> {
    let records = collect_records(table, request).await?;
    match records.iter().find(|record| record.kind() == Some(T::KIND)) {
        Some(record) => Ok(Some(T::from_record(record)?)),
        None => Ok(None),
    }
}

/// Streams the entities of one kind matched by an index query, skipping
/// records other kinds project into the same index.
pub(crate) fn index_stream<T: Artifact + 'static>(
    table: Arc<dyn KeyValueTable>,
    request: QueryRequest,
) -> BoxStream<'static, StorageResult<T>> {
    let fetch: PageFetcher = Box::new(move |start, limit| {
        let table = table.clone();
        let mut request = request.clone().with_start(start);
        if let Some(limit) = limit {
            request = request.with_limit(limit);
        }
        Box::pin(async move { table.query(request).await })
    });
    list_records(fetch, None, None)
        .filter_map(|result| {
            future::ready(match result {
                Ok(record) if record.kind() == Some(T::KIND) => Some(T::from_record(&record)),
                Ok(_) => None,
                Err(err) => Some(Err(err)),
            })
        })
        .boxed()
}

/// Streams a full listing of one kind with `(count, offset)` paging over a
/// kind-filtered scan.
pub(crate) fn list_stream<T: Artifact + 'static>(
    table: Arc<dyn KeyValueTable>,
    count: Option<usize>,
    offset: Option<usize>,
) -> BoxStream<'static, StorageResult<T>> {
    let fetch: PageFetcher = Box::new(move |start, limit| {
        let table = table.clone();
        let mut request = ScanRequest::of_kind(T::KIND).with_start(start);
        if let Some(limit) = limit {
            request = request.with_limit(limit);
        }
        Box::pin(async move { table.scan(request).await })
    });
    list_records(fetch, count, offset)
        .map(|result| result.and_then(|record| T::from_record(&record)))
        .boxed()
}

/// Loads many entities of one kind by id, skipping ids that no longer
/// resolve (projection reads are eventually consistent against parents).
pub(crate) async fn batch_load<T: Artifact>(
    table: &dyn KeyValueTable,
    ids: &[String],
) -> StorageResult<Vec<T>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let keys: Vec<(String, String)> = ids
        .iter()
        .map(|id| {
            (
                keys::entity_pk(T::KIND, id),
                keys::entity_sk(T::KIND).to_string(),
            )
        })
        .collect();
    let records = table.batch_get(&keys).await?;
    records
        .iter()
        .filter(|record| record.kind() == Some(T::KIND))
        .map(T::from_record)
        .collect()
}

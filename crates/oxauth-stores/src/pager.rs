//! Cursor-driven paging with `(count, offset)` list semantics.
//!
//! The substrate only pages forward through opaque continuation cursors, so
//! offset paging is recovered by replay: a page-aligned offset fetches and
//! discards the preceding records before emitting. Anything else cannot be
//! honored exactly and fails with `UnsupportedPagination` instead of being
//! approximated. Backends may return short pages (response size caps, scan
//! filters), so skipping and emitting both count records, following cursors
//! across as many fetches as it takes. The pager itself is stateless; all
//! continuation state lives in the fetched cursors.

use std::collections::VecDeque;

use futures_util::future::{self, BoxFuture};
use futures_util::stream::{self, BoxStream, StreamExt};

use oxauth_storage::{Cursor, Record, RecordPage, StorageError, StorageResult};

/// Fetches one page: takes the continuation cursor and the page size.
pub(crate) type PageFetcher = Box<
    dyn Fn(Option<Cursor>, Option<usize>) -> BoxFuture<'static, StorageResult<RecordPage>>
        + Send
        + Sync,
>;

/// How a `(count, offset)` pair maps onto record skips and emits.
struct ListPlan {
    /// Records to fetch and discard before emitting.
    skip_records: usize,
    /// Records to emit afterwards; `None` streams to exhaustion.
    emit_records: Option<usize>,
}

impl ListPlan {
    fn resolve(count: Option<usize>, offset: Option<usize>) -> StorageResult<Self> {
        match (count, offset) {
            (None, None) => Ok(Self {
                skip_records: 0,
                emit_records: None,
            }),
            (Some(0), _) => Err(StorageError::invalid_argument(
                "count",
                "must be greater than zero",
            )),
            (Some(count), None) => Ok(Self {
                skip_records: 0,
                emit_records: Some(count),
            }),
            (Some(count), Some(offset)) => {
                if offset % count != 0 {
                    return Err(StorageError::unsupported_pagination(format!(
                        "offset {offset} is not a multiple of count {count}"
                    )));
                }
                Ok(Self {
                    skip_records: offset,
                    emit_records: Some(count),
                })
            }
            (None, Some(_)) => Err(StorageError::unsupported_pagination(
                "offset requires count",
            )),
        }
    }
}

struct ListState {
    fetch: PageFetcher,
    page_size: Option<usize>,
    cursor: Option<Cursor>,
    buffer: VecDeque<Record>,
    skip_records: usize,
    remaining: Option<usize>,
    done: bool,
}

/// Streams records lazily according to the `(count, offset)` contract:
/// no arguments follows cursors to exhaustion, `count` alone yields the
/// first `count` records, `count` plus a page-aligned `offset` yields
/// exactly that page. Fetches happen on demand as the stream is polled.
pub(crate) fn list_records(
    fetch: PageFetcher,
    count: Option<usize>,
    offset: Option<usize>,
) -> BoxStream<'static, StorageResult<Record>> {
    let plan = match ListPlan::resolve(count, offset) {
        Ok(plan) => plan,
        Err(err) => return stream::once(future::ready(Err(err))).boxed(),
    };

    let state = ListState {
        fetch,
        page_size: count,
        cursor: None,
        buffer: VecDeque::new(),
        skip_records: plan.skip_records,
        remaining: plan.emit_records,
        done: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(record) = state.buffer.pop_front() {
                if let Some(remaining) = state.remaining.as_mut() {
                    *remaining -= 1;
                    if *remaining == 0 {
                        state.done = true;
                        state.buffer.clear();
                    }
                }
                return Some((Ok(record), state));
            }
            if state.done {
                return None;
            }

            let page = match (state.fetch)(state.cursor.take(), state.page_size).await {
                Ok(page) => page,
                Err(err) => {
                    state.done = true;
                    return Some((Err(err), state));
                }
            };
            state.cursor = page.next;
            if state.cursor.is_none() {
                // Offsets past the end of the data yield an empty page.
                state.done = true;
            }

            let mut records = page.records;
            if state.skip_records > 0 {
                let dropped = state.skip_records.min(records.len());
                records.drain(..dropped);
                state.skip_records -= dropped;
            }
            state.buffer.extend(records);
        }
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxauth_storage::RecordKind;
    use serde_json::{Map, json};

    fn records(n: usize) -> Vec<Record> {
        (0..n)
            .map(|i| Record::new(format!("TOKEN#{i:02}"), "TOKEN", RecordKind::Token))
            .collect()
    }

    /// A fetcher over a fixed record list; cursors encode the next start
    /// position.
    fn fetcher(records: Vec<Record>) -> PageFetcher {
        Box::new(move |start, limit| {
            let records = records.clone();
            Box::pin(async move {
                let begin = match start {
                    None => 0,
                    Some(cursor) => cursor
                        .decode()?
                        .get("i")
                        .and_then(serde_json::Value::as_u64)
                        .unwrap_or(0) as usize,
                };
                let end = (begin + limit.unwrap_or(3)).min(records.len());
                let next = (end < records.len()).then(|| {
                    let mut key = Map::new();
                    key.insert("i".to_string(), json!(end as u64));
                    Cursor::encode(&key)
                });
                Ok(RecordPage {
                    records: records[begin..end].to_vec(),
                    next,
                })
            })
        })
    }

    /// Like [`fetcher`], but never returns more than `cap` records per page
    /// regardless of the requested limit, the way a backend truncates at a
    /// response size cap.
    fn truncating_fetcher(records: Vec<Record>, cap: usize) -> PageFetcher {
        Box::new(move |start, limit| {
            let records = records.clone();
            Box::pin(async move {
                let begin = match start {
                    None => 0,
                    Some(cursor) => cursor
                        .decode()?
                        .get("i")
                        .and_then(serde_json::Value::as_u64)
                        .unwrap_or(0) as usize,
                };
                let take = limit.unwrap_or(cap).min(cap);
                let end = (begin + take).min(records.len());
                let next = (end < records.len()).then(|| {
                    let mut key = Map::new();
                    key.insert("i".to_string(), json!(end as u64));
                    Cursor::encode(&key)
                });
                Ok(RecordPage {
                    records: records[begin..end].to_vec(),
                    next,
                })
            })
        })
    }

    async fn collect_pks(
        stream: BoxStream<'static, StorageResult<Record>>,
    ) -> StorageResult<Vec<String>> {
        let results: Vec<StorageResult<Record>> = stream.collect().await;
        results
            .into_iter()
            .map(|result| result.map(|record| record.pk))
            .collect()
    }

    #[tokio::test]
    async fn test_unpaged_list_follows_cursors_to_exhaustion() {
        let pks = collect_pks(list_records(fetcher(records(10)), None, None))
            .await
            .unwrap();
        assert_eq!(pks.len(), 10);
        assert_eq!(pks[0], "TOKEN#00");
        assert_eq!(pks[9], "TOKEN#09");
    }

    #[tokio::test]
    async fn test_count_yields_first_page_only() {
        let pks = collect_pks(list_records(fetcher(records(10)), Some(4), None))
            .await
            .unwrap();
        assert_eq!(pks, vec!["TOKEN#00", "TOKEN#01", "TOKEN#02", "TOKEN#03"]);
    }

    #[tokio::test]
    async fn test_aligned_offset_pages_are_disjoint_and_complete() {
        let first = collect_pks(list_records(fetcher(records(10)), Some(5), Some(0)))
            .await
            .unwrap();
        let second = collect_pks(list_records(fetcher(records(10)), Some(5), Some(5)))
            .await
            .unwrap();
        assert_eq!(first.len(), 5);
        assert_eq!(second.len(), 5);
        let mut union = first;
        union.extend(second);
        union.sort();
        union.dedup();
        assert_eq!(union.len(), 10);
    }

    #[tokio::test]
    async fn test_count_spans_truncated_pages() {
        let pks = collect_pks(list_records(
            truncating_fetcher(records(10), 3),
            Some(5),
            None,
        ))
        .await
        .unwrap();
        assert_eq!(
            pks,
            vec!["TOKEN#00", "TOKEN#01", "TOKEN#02", "TOKEN#03", "TOKEN#04"]
        );
    }

    #[tokio::test]
    async fn test_offset_replay_skips_records_across_truncated_pages() {
        let first = collect_pks(list_records(
            truncating_fetcher(records(10), 3),
            Some(5),
            Some(0),
        ))
        .await
        .unwrap();
        let second = collect_pks(list_records(
            truncating_fetcher(records(10), 3),
            Some(5),
            Some(5),
        ))
        .await
        .unwrap();
        assert_eq!(
            first,
            vec!["TOKEN#00", "TOKEN#01", "TOKEN#02", "TOKEN#03", "TOKEN#04"]
        );
        assert_eq!(
            second,
            vec!["TOKEN#05", "TOKEN#06", "TOKEN#07", "TOKEN#08", "TOKEN#09"]
        );
    }

    #[tokio::test]
    async fn test_offset_past_end_is_empty() {
        let pks = collect_pks(list_records(fetcher(records(4)), Some(5), Some(10)))
            .await
            .unwrap();
        assert!(pks.is_empty());
    }

    #[tokio::test]
    async fn test_misaligned_offset_is_unsupported() {
        let err = collect_pks(list_records(fetcher(records(10)), Some(5), Some(7)))
            .await
            .unwrap_err();
        assert!(err.is_unsupported_pagination());
    }

    #[tokio::test]
    async fn test_offset_without_count_is_unsupported() {
        let err = collect_pks(list_records(fetcher(records(10)), None, Some(5)))
            .await
            .unwrap_err();
        assert!(err.is_unsupported_pagination());
    }

    #[tokio::test]
    async fn test_zero_count_is_invalid() {
        let err = collect_pks(list_records(fetcher(records(10)), Some(0), None))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidArgument { .. }));
    }
}

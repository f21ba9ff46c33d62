//! Retention sweeps for authorizations and tokens.
//!
//! Both sweeps walk a kind-filtered scan, gating on each record's
//! `CreationDate` attribute: only records dated at or before the
//! caller-supplied threshold are considered, anything newer (or undated) is
//! out of scope. Deletions are unconditional primary
//! key deletes, so a record that survives one pass for the same reason
//! survives the next: the sweeps are idempotent.

use std::sync::Arc;

use time::OffsetDateTime;
use tracing::debug;

use oxauth_core::{Authorization, Token};
use oxauth_storage::keys;
use oxauth_storage::schema::{ATTR_AUTHORIZATION_ID, ATTR_CREATION_DATE, index};
use oxauth_storage::{KeyValueTable, QueryRequest, RecordKind, ScanRequest, StorageResult};

use crate::artifact::Artifact;

/// Prunes stale authorizations and tokens.
#[derive(Clone)]
pub(crate) struct RetentionPruner {
    table: Arc<dyn KeyValueTable>,
}

impl RetentionPruner {
    pub(crate) fn new(table: Arc<dyn KeyValueTable>) -> Self {
        Self { table }
    }

    fn past_threshold(creation_date: Option<OffsetDateTime>, threshold: OffsetDateTime) -> bool {
        creation_date.is_some_and(|created| created <= threshold)
    }

    /// Removes stale authorizations created at or before `threshold`.
    ///
    /// An ad-hoc authorization is kept while at least one token still
    /// references it, whatever that token's status; any other authorization
    /// is kept while its status is valid. Returns the number of deletions.
    pub(crate) async fn prune_authorizations(
        &self,
        threshold: OffsetDateTime,
    ) -> StorageResult<usize> {
        let mut deleted = 0;
        let mut start = None;
        loop {
            let page = self
                .table
                .scan(ScanRequest::of_kind(RecordKind::Authorization).with_start(start.take()))
                .await?;
            for record in &page.records {
                if !Self::past_threshold(record.get_time(ATTR_CREATION_DATE)?, threshold) {
                    continue;
                }
                let authorization = Authorization::from_record(record)?;
                let keep = if authorization.is_ad_hoc() {
                    self.has_referencing_token(&authorization.id).await?
                } else {
                    authorization.is_valid()
                };
                if !keep {
                    self.table.delete(&record.pk, &record.sk).await?;
                    deleted += 1;
                }
            }
            match page.next {
                Some(next) => start = Some(next),
                None => break,
            }
        }
        debug!(deleted, "authorization retention sweep finished");
        Ok(deleted)
    }

    /// Removes stale tokens created at or before `threshold`.
    ///
    /// A token is deleted when it is no longer live (expiration unset or in
    /// the past) or when the authorization it references is missing or no
    /// longer valid. Returns the number of deletions.
    pub(crate) async fn prune_tokens(&self, threshold: OffsetDateTime) -> StorageResult<usize> {
        let now = OffsetDateTime::now_utc();
        let mut deleted = 0;
        let mut start = None;
        loop {
            let page = self
                .table
                .scan(ScanRequest::of_kind(RecordKind::Token).with_start(start.take()))
                .await?;
            for record in &page.records {
                if !Self::past_threshold(record.get_time(ATTR_CREATION_DATE)?, threshold) {
                    continue;
                }
                let token = Token::from_record(record)?;
                let orphaned = match token.authorization_id.as_deref() {
                    None | Some("") => false,
                    Some(authorization_id) => !self.authorization_valid(authorization_id).await?,
                };
                if !token.is_live_at(now) || orphaned {
                    self.table.delete(&record.pk, &record.sk).await?;
                    deleted += 1;
                }
            }
            match page.next {
                Some(next) => start = Some(next),
                None => break,
            }
        }
        debug!(deleted, "token retention sweep finished");
        Ok(deleted)
    }

    /// Whether any token, of any status, still references the authorization.
    async fn has_referencing_token(&self, authorization_id: &str) -> StorageResult<bool> {
        let page = self
            .table
            .query(
                QueryRequest::index(
                    index::AUTHORIZATION_ID,
                    ATTR_AUTHORIZATION_ID,
                    authorization_id,
                )
                .with_limit(1),
            )
            .await?;
        Ok(page
            .records
            .iter()
            .any(|record| record.kind() == Some(RecordKind::Token)))
    }

    /// Whether the referenced authorization exists and has a valid status.
    /// A dangling reference counts as not valid.
    async fn authorization_valid(&self, authorization_id: &str) -> StorageResult<bool> {
        let record = self
            .table
            .get(
                &keys::entity_pk(RecordKind::Authorization, authorization_id),
                keys::entity_sk(RecordKind::Authorization),
            )
            .await?;
        match record {
            Some(record) => Ok(Authorization::from_record(&record)?.is_valid()),
            None => Ok(false),
        }
    }
}

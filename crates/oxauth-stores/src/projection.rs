//! Derived index projections for membership-in-list lookups.
//!
//! Applications project one record per redirect URI (partitioned by the URI
//! itself) and scopes project one record per resource, so "which entities
//! contain this value" is a key lookup instead of a scan. Projections are
//! reconciled synchronously on every mutation by diffing the old and new
//! source lists, and torn down on delete. There is no cross-record
//! transaction: a crash can leave a stray projection behind, and the next
//! reconcile of the same parent converges it.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;

use oxauth_core::{Application, Scope};
use oxauth_storage::keys::{self, RESOURCE_SK_PREFIX, RedirectKind};
use oxauth_storage::schema::{ATTR_APPLICATION_ID, ATTR_SCOPE_RESOURCE, ATTR_SK, index};
use oxauth_storage::{
    KeyValueTable, PutCondition, QueryRequest, Record, RecordKind, StorageResult,
};

/// Keeps redirect and resource projections in lockstep with their parents.
#[derive(Clone)]
pub(crate) struct ProjectionMaintainer {
    table: Arc<dyn KeyValueTable>,
}

impl ProjectionMaintainer {
    pub(crate) fn new(table: Arc<dyn KeyValueTable>) -> Self {
        Self { table }
    }

    // -----------------------------------------------------------------------
    // Application redirect URIs
    // -----------------------------------------------------------------------

    fn redirect_entries(application: &Application) -> BTreeSet<(RedirectKind, String)> {
        application
            .redirect_uris
            .iter()
            .map(|uri| (RedirectKind::Redirect, uri.clone()))
            .chain(
                application
                    .post_logout_redirect_uris
                    .iter()
                    .map(|uri| (RedirectKind::PostLogout, uri.clone())),
            )
            .collect()
    }

    fn redirect_record(application_id: &str, kind: RedirectKind, uri: &str) -> Record {
        let mut record = Record::new(
            keys::redirect_pk(uri),
            keys::redirect_sk(kind, application_id),
            RecordKind::RedirectProjection,
        );
        record.set_sparse_str(ATTR_APPLICATION_ID, application_id);
        record
    }

    /// Diffs the application's redirect lists against `previous` and applies
    /// one put/delete per changed entry. `previous = None` treats every
    /// entry as new.
    pub(crate) async fn reconcile_application(
        &self,
        application: &Application,
        previous: Option<&Application>,
    ) -> StorageResult<()> {
        let current = Self::redirect_entries(application);
        let stored = previous.map(Self::redirect_entries).unwrap_or_default();

        for (kind, uri) in current.difference(&stored) {
            self.table
                .put(
                    Self::redirect_record(&application.id, *kind, uri),
                    PutCondition::None,
                )
                .await?;
        }
        for (kind, uri) in stored.difference(&current) {
            self.table
                .delete(&keys::redirect_pk(uri), &keys::redirect_sk(*kind, &application.id))
                .await?;
        }
        debug!(
            application_id = application.id.as_str(),
            entries = current.len(),
            "redirect projections reconciled"
        );
        Ok(())
    }

    /// Removes every redirect projection owned by an application, following
    /// the shared `ApplicationId-index` (the application's own record may
    /// already be gone).
    pub(crate) async fn teardown_application(&self, application_id: &str) -> StorageResult<()> {
        let mut start = None;
        loop {
            let page = self
                .table
                .query(
                    QueryRequest::index(index::APPLICATION_ID, ATTR_APPLICATION_ID, application_id)
                        .with_start(start.take()),
                )
                .await?;
            for record in &page.records {
                if record.kind() == Some(RecordKind::RedirectProjection) {
                    self.table.delete(&record.pk, &record.sk).await?;
                }
            }
            match page.next {
                Some(next) => start = Some(next),
                None => break,
            }
        }
        debug!(application_id, "redirect projections torn down");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Scope resources
    // -----------------------------------------------------------------------

    fn resource_entries(scope: &Scope) -> BTreeSet<String> {
        scope.resources.iter().cloned().collect()
    }

    fn resource_record(scope_id: &str, resource: &str) -> Record {
        let mut record = Record::new(
            keys::entity_pk(RecordKind::Scope, scope_id),
            keys::resource_sk(resource),
            RecordKind::ResourceProjection,
        );
        record.set_sparse_str(ATTR_SCOPE_RESOURCE, resource);
        record
    }

    /// Diffs the scope's resource list against `previous` and applies one
    /// put/delete per changed entry.
    pub(crate) async fn reconcile_scope(
        &self,
        scope: &Scope,
        previous: Option<&Scope>,
    ) -> StorageResult<()> {
        let current = Self::resource_entries(scope);
        let stored = previous.map(Self::resource_entries).unwrap_or_default();

        for resource in current.difference(&stored) {
            self.table
                .put(Self::resource_record(&scope.id, resource), PutCondition::None)
                .await?;
        }
        for resource in stored.difference(&current) {
            self.table
                .delete(
                    &keys::entity_pk(RecordKind::Scope, &scope.id),
                    &keys::resource_sk(resource),
                )
                .await?;
        }
        debug!(
            scope_id = scope.id.as_str(),
            entries = current.len(),
            "resource projections reconciled"
        );
        Ok(())
    }

    /// Removes every resource projection in a scope's partition. Projections
    /// share the parent partition, so teardown is a single partition query.
    pub(crate) async fn teardown_scope(&self, scope_id: &str) -> StorageResult<()> {
        let pk = keys::entity_pk(RecordKind::Scope, scope_id);
        let mut start = None;
        loop {
            let page = self
                .table
                .query(
                    QueryRequest::partition(pk.clone())
                        .with_range_prefix(ATTR_SK, RESOURCE_SK_PREFIX)
                        .with_start(start.take()),
                )
                .await?;
            for record in &page.records {
                self.table.delete(&record.pk, &record.sk).await?;
            }
            match page.next {
                Some(next) => start = Some(next),
                None => break,
            }
        }
        debug!(scope_id, "resource projections torn down");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxauth_db_memory::InMemoryTable;

    fn maintainer() -> (Arc<InMemoryTable>, ProjectionMaintainer) {
        let table = Arc::new(InMemoryTable::new());
        (table.clone(), ProjectionMaintainer::new(table))
    }

    fn app_with_uris(redirects: &[&str], post_logout: &[&str]) -> Application {
        let mut app = Application::new("client");
        app.id = "app-1".to_string();
        app.redirect_uris = redirects.iter().map(|s| s.to_string()).collect();
        app.post_logout_redirect_uris = post_logout.iter().map(|s| s.to_string()).collect();
        app
    }

    #[tokio::test]
    async fn test_reconcile_application_diffs_entries() {
        let (table, maintainer) = maintainer();
        let app = app_with_uris(&["https://a/x", "https://a/y"], &["https://a/out"]);
        maintainer.reconcile_application(&app, None).await.unwrap();
        assert_eq!(table.len().await, 3);

        // Drop one URI, move another list.
        let changed = app_with_uris(&["https://a/x"], &["https://a/y"]);
        maintainer
            .reconcile_application(&changed, Some(&app))
            .await
            .unwrap();
        assert_eq!(table.len().await, 2);
        assert!(
            table
                .get("REDIRECT#https://a/y", "POSTLOGOUT#app-1")
                .await
                .unwrap()
                .is_some()
        );
        assert!(
            table
                .get("REDIRECT#https://a/y", "REDIRECT#app-1")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_teardown_application_removes_all() {
        let (table, maintainer) = maintainer();
        let app = app_with_uris(&["https://a/x", "https://a/y"], &["https://a/out"]);
        maintainer.reconcile_application(&app, None).await.unwrap();

        maintainer.teardown_application("app-1").await.unwrap();
        assert!(table.is_empty().await);
    }

    #[tokio::test]
    async fn test_scope_resource_projections_share_partition() {
        let (table, maintainer) = maintainer();
        let mut scope = Scope::new("billing");
        scope.id = "s-1".to_string();
        scope.resources = vec!["api://billing".to_string(), "api://audit".to_string()];

        maintainer.reconcile_scope(&scope, None).await.unwrap();
        assert!(
            table
                .get("SCOPE#s-1", "RESOURCE#api://billing")
                .await
                .unwrap()
                .is_some()
        );

        maintainer.teardown_scope("s-1").await.unwrap();
        assert!(table.is_empty().await);
    }
}

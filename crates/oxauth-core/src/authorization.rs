//! Authorization (consent grant) domain type.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// A recorded consent/grant linking a subject and an application.
///
/// An ad-hoc authorization (see [`crate::constants::authorization_kinds`])
/// is ephemeral: it is only meaningful while live tokens reference it and
/// becomes eligible for pruning once none do.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Authorization {
    /// Engine-assigned unique identifier.
    #[serde(default)]
    pub id: String,

    /// Identifier of the application the grant was issued to.
    #[serde(default)]
    pub application_id: String,

    /// Subject (user) identifier the grant was issued for.
    #[serde(default)]
    pub subject: String,

    /// Authorization kind ("permanent" or "ad-hoc").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// Status ("valid", "inactive", "revoked", ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    /// Scopes covered by the grant.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub scopes: BTreeSet<String>,

    /// When the grant was recorded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<OffsetDateTime>,

    /// Opaque caller-defined properties, stored verbatim.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<serde_json::Value>,

    /// Engine-assigned optimistic concurrency token.
    #[serde(default)]
    pub concurrency_token: String,
}

impl Authorization {
    /// Returns `true` when the authorization is ad-hoc.
    #[must_use]
    pub fn is_ad_hoc(&self) -> bool {
        self.kind.as_deref() == Some(crate::constants::authorization_kinds::AD_HOC)
    }

    /// Returns `true` when the authorization's status is "valid".
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.status.as_deref() == Some(crate::constants::statuses::VALID)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{authorization_kinds, statuses};

    #[test]
    fn test_kind_predicates() {
        let mut auth = Authorization::default();
        assert!(!auth.is_ad_hoc());
        auth.kind = Some(authorization_kinds::AD_HOC.to_string());
        assert!(auth.is_ad_hoc());
        auth.kind = Some(authorization_kinds::PERMANENT.to_string());
        assert!(!auth.is_ad_hoc());
    }

    #[test]
    fn test_status_predicates() {
        let mut auth = Authorization::default();
        assert!(!auth.is_valid());
        auth.status = Some(statuses::VALID.to_string());
        assert!(auth.is_valid());
        auth.status = Some(statuses::REVOKED.to_string());
        assert!(!auth.is_valid());
    }
}

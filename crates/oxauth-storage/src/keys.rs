//! Deterministic primary-key construction.
//!
//! Every entity kind maps to a `(PK, SK)` pair built from a kind prefix and
//! the entity id, so heterogeneous kinds coexist in one partitioned
//! keyspace:
//!
//! ```text
//! Application:          PK = "APPLICATION#{id}"    SK = "APPLICATION"
//! Authorization:        PK = "AUTHORIZATION#{id}"  SK = "AUTHORIZATION"
//! Scope:                PK = "SCOPE#{id}"          SK = "SCOPE"
//! Token:                PK = "TOKEN#{id}"          SK = "TOKEN"
//! RedirectProjection:   PK = "REDIRECT#{uri}"      SK = "{REDIRECT|POSTLOGOUT}#{application_id}"
//! ResourceProjection:   PK = "SCOPE#{scope_id}"    SK = "RESOURCE#{resource}"
//! ```
//!
//! Redirect projections partition on the URI so that membership lookup is a
//! strongly consistent primary-partition query. Resource projections share
//! their parent scope's partition so that teardown is a single partition
//! query; membership lookup rides the `Resource-index`.

use crate::record::RecordKind;

/// Separator between key segments.
pub const KEY_SEPARATOR: char = '#';

/// Sort-key prefix of resource projection records inside a scope partition.
pub const RESOURCE_SK_PREFIX: &str = "RESOURCE#";

/// Which redirect list a redirect projection record mirrors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RedirectKind {
    /// `redirect_uris` entry.
    Redirect,
    /// `post_logout_redirect_uris` entry.
    PostLogout,
}

impl RedirectKind {
    /// Sort-key prefix for projection records of this redirect kind.
    #[must_use]
    pub fn sk_prefix(&self) -> &'static str {
        match self {
            Self::Redirect => "REDIRECT#",
            Self::PostLogout => "POSTLOGOUT#",
        }
    }
}

/// Builds the partition key of an entity's primary record.
#[must_use]
pub fn entity_pk(kind: RecordKind, id: &str) -> String {
    format!("{}{}{}", kind.as_str(), KEY_SEPARATOR, id)
}

/// Returns the fixed sort-key discriminator of an entity's primary record.
#[must_use]
pub fn entity_sk(kind: RecordKind) -> &'static str {
    kind.as_str()
}

/// Builds the partition key of the redirect projection partition for a URI.
#[must_use]
pub fn redirect_pk(uri: &str) -> String {
    format!("REDIRECT{KEY_SEPARATOR}{uri}")
}

/// Builds the sort key of a redirect projection record.
#[must_use]
pub fn redirect_sk(kind: RedirectKind, application_id: &str) -> String {
    format!("{}{}", kind.sk_prefix(), application_id)
}

/// Builds the sort key of a resource projection record.
#[must_use]
pub fn resource_sk(resource: &str) -> String {
    format!("{RESOURCE_SK_PREFIX}{resource}")
}

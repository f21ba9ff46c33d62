//! Shared table schema: attribute names, secondary index declarations, and
//! caller-configurable naming.
//!
//! One physical table holds every entity kind; a small fixed set of
//! secondary indexes is shared across kinds. A record only populates the
//! index attributes that are meaningful for its kind, so every index is
//! sparse (records of other kinds simply never appear in it unless they
//! share the attribute, in which case readers filter on the kind
//! discriminator).
//!
//! ```text
//! Table: oxauth (configurable)
//!
//! Primary Key:
//!   - PK (String, partition key): "{KIND}#{id}" (projections differ, see keys)
//!   - SK (String, sort key): fixed kind discriminator or projection suffix
//!
//! Record attributes:
//!   - Kind: String - record kind discriminator
//!   - Document: Map - the full entity document (opaque to the substrate)
//!   - ConcurrencyToken: String - optimistic concurrency version token
//!   - CreationDate: String (RFC 3339) - retention sweep gate
//!   plus the sparse per-kind index attributes listed below
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Partition key attribute.
pub const ATTR_PK: &str = "PK";

/// Sort key attribute.
pub const ATTR_SK: &str = "SK";

/// Record kind discriminator.
pub const ATTR_KIND: &str = "Kind";

/// Full entity document (opaque to the substrate).
pub const ATTR_DOCUMENT: &str = "Document";

/// Optimistic concurrency version token.
pub const ATTR_CONCURRENCY_TOKEN: &str = "ConcurrencyToken";

/// Creation timestamp (RFC 3339), the retention sweep gate.
pub const ATTR_CREATION_DATE: &str = "CreationDate";

/// Owning application id (applications' own records, authorizations,
/// tokens, and redirect projections).
pub const ATTR_APPLICATION_ID: &str = "ApplicationId";

/// Client identifier (applications).
pub const ATTR_CLIENT_ID: &str = "ClientId";

/// Subject identifier (authorizations and tokens).
pub const ATTR_SUBJECT: &str = "Subject";

/// Derived compound key "{subject}#{application_id}" (authorizations and
/// tokens) enabling exact subject+client index queries.
pub const ATTR_SEARCH_KEY: &str = "SearchKey";

/// Scope name (scopes).
pub const ATTR_SCOPE_NAME: &str = "ScopeName";

/// Scope resource (resource projections).
pub const ATTR_SCOPE_RESOURCE: &str = "ScopeResource";

/// Referenced authorization id (tokens).
pub const ATTR_AUTHORIZATION_ID: &str = "AuthorizationId";

/// Reference identifier (reference tokens).
pub const ATTR_REFERENCE_ID: &str = "ReferenceId";

/// Default table name.
pub const DEFAULT_TABLE_NAME: &str = "oxauth";

// ---------------------------------------------------------------------------
// Secondary indexes
// ---------------------------------------------------------------------------

/// Canonical (default) secondary index names.
pub mod index {
    pub const APPLICATION_ID: &str = "ApplicationId-index";
    pub const SUBJECT: &str = "Subject-index";
    pub const CLIENT_ID: &str = "ClientId-index";
    pub const NAME: &str = "Name-index";
    pub const RESOURCE: &str = "Resource-index";
    pub const AUTHORIZATION_ID: &str = "AuthorizationId-index";
    pub const REFERENCE_ID: &str = "ReferenceId-index";
    pub const SUBJECT_SEARCH_KEY: &str = "Subject-SearchKey-index";
}

/// Declaration of a single secondary index: name plus hash key and optional
/// range key attributes. All indexes project every attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexDef {
    /// Canonical index name (subject to alias indirection, see
    /// [`TableOptions::index_name`]).
    pub name: &'static str,
    /// Hash key attribute.
    pub hash_key: &'static str,
    /// Optional range key attribute.
    pub range_key: Option<&'static str>,
}

/// The fixed index shape every backend must provide. The names are
/// configurable; the shape is not.
pub const INDEXES: &[IndexDef] = &[
    IndexDef {
        name: index::APPLICATION_ID,
        hash_key: ATTR_APPLICATION_ID,
        range_key: Some(ATTR_SK),
    },
    IndexDef {
        name: index::SUBJECT,
        hash_key: ATTR_SUBJECT,
        range_key: Some(ATTR_SK),
    },
    IndexDef {
        name: index::CLIENT_ID,
        hash_key: ATTR_CLIENT_ID,
        range_key: None,
    },
    IndexDef {
        name: index::NAME,
        hash_key: ATTR_SCOPE_NAME,
        range_key: None,
    },
    IndexDef {
        name: index::RESOURCE,
        hash_key: ATTR_SCOPE_RESOURCE,
        range_key: None,
    },
    IndexDef {
        name: index::AUTHORIZATION_ID,
        hash_key: ATTR_AUTHORIZATION_ID,
        range_key: None,
    },
    IndexDef {
        name: index::REFERENCE_ID,
        hash_key: ATTR_REFERENCE_ID,
        range_key: None,
    },
    IndexDef {
        name: index::SUBJECT_SEARCH_KEY,
        hash_key: ATTR_SUBJECT,
        range_key: Some(ATTR_SEARCH_KEY),
    },
];

/// Looks up the declaration of a canonical index name.
#[must_use]
pub fn index_def(name: &str) -> Option<&'static IndexDef> {
    INDEXES.iter().find(|def| def.name == name)
}

// ---------------------------------------------------------------------------
// Caller configuration
// ---------------------------------------------------------------------------

/// Billing mode the table was (or will be) provisioned with. Write paths
/// never depend on it; provisioning omits throughput in on-demand mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "mode")]
pub enum BillingMode {
    /// Pay-per-request (on-demand) capacity.
    OnDemand,
    /// Provisioned read/write capacity units.
    Provisioned {
        read_capacity: i64,
        write_capacity: i64,
    },
}

impl Default for BillingMode {
    fn default() -> Self {
        Self::OnDemand
    }
}

/// Table naming configuration.
///
/// Deployments may rename the table and individual indexes (alias
/// indirection); the engine always refers to indexes by their canonical
/// name and resolves the physical name through [`TableOptions::index_name`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TableOptions {
    /// Physical table name.
    pub table_name: String,

    /// Canonical index name -> physical index name overrides.
    pub index_aliases: BTreeMap<String, String>,

    /// Billing mode used when provisioning the table.
    pub billing_mode: BillingMode,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            table_name: DEFAULT_TABLE_NAME.to_string(),
            index_aliases: BTreeMap::new(),
            billing_mode: BillingMode::default(),
        }
    }
}

impl TableOptions {
    /// Creates options for the given table name with canonical index names.
    #[must_use]
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            ..Self::default()
        }
    }

    /// Resolves the physical name of a canonical index.
    #[must_use]
    pub fn index_name<'a>(&'a self, canonical: &'a str) -> &'a str {
        self.index_aliases
            .get(canonical)
            .map_or(canonical, String::as_str)
    }
}

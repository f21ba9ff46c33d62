//! Scope (permission definition) domain type.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A named permission/resource-access unit a client can request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scope {
    /// Engine-assigned unique identifier.
    #[serde(default)]
    pub id: String,

    /// Scope name as it appears in `scope` request parameters. Unique.
    pub name: String,

    /// Human-readable display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// Localized display names, keyed by culture tag.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub display_names: BTreeMap<String, String>,

    /// Description shown on consent screens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Localized descriptions, keyed by culture tag.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub descriptions: BTreeMap<String, String>,

    /// Resource servers (audiences) this scope grants access to.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<String>,

    /// Opaque caller-defined properties, stored verbatim.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<serde_json::Value>,

    /// Engine-assigned optimistic concurrency token.
    #[serde(default)]
    pub concurrency_token: String,
}

impl Scope {
    /// Creates a scope with the given name and all other fields empty.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

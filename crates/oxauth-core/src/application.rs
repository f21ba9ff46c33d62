//! Application (client registration) domain type.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// A registered OAuth 2.0 / OpenID Connect client.
///
/// The `id` and `concurrency_token` fields are engine-assigned: leave them
/// empty on a fresh instance and the store fills them in on create. The
/// `properties` blob is an opaque bag of caller metadata, stored and
/// returned verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    /// Engine-assigned unique identifier.
    #[serde(default)]
    pub id: String,

    /// Client identifier used in OAuth flows. Unique across applications.
    pub client_id: String,

    /// Hashed client secret (confidential clients only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    /// Client type ("confidential" or "public").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_type: Option<String>,

    /// Consent type ("explicit", "implicit", "systematic").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consent_type: Option<String>,

    /// Human-readable display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// Localized display names, keyed by culture tag.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub display_names: BTreeMap<String, String>,

    /// Permissions granted to the client (endpoints, grant types, scopes).
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub permissions: BTreeSet<String>,

    /// Allowed redirect URIs for the authorization code flow.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub redirect_uris: Vec<String>,

    /// Allowed post-logout redirect URIs for RP-initiated logout.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub post_logout_redirect_uris: Vec<String>,

    /// Requirements enforced for the client (e.g. PKCE).
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub requirements: BTreeSet<String>,

    /// Client settings (token lifetimes etc.), keyed by setting name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub settings: BTreeMap<String, String>,

    /// JSON web key set exposing the client's signing/encryption keys.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwks: Option<serde_json::Value>,

    /// Opaque caller-defined properties, stored verbatim.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<serde_json::Value>,

    /// Engine-assigned optimistic concurrency token.
    #[serde(default)]
    pub concurrency_token: String,
}

impl Application {
    /// Creates an application with the given client identifier and all other
    /// fields empty.
    #[must_use]
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            ..Self::default()
        }
    }

    /// Checks whether the given redirect URI is registered (exact match).
    #[must_use]
    pub fn has_redirect_uri(&self, uri: &str) -> bool {
        self.redirect_uris.iter().any(|u| u == uri)
    }

    /// Checks whether the given post-logout redirect URI is registered
    /// (exact match).
    #[must_use]
    pub fn has_post_logout_redirect_uri(&self, uri: &str) -> bool {
        self.post_logout_redirect_uris.iter().any(|u| u == uri)
    }
}

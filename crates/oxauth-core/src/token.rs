//! Token (security artifact) domain type.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// An issued credential (access token, refresh token, authorization code...)
/// tied to an application and optionally a subject and an authorization.
///
/// Tokens reference their parents by id only; the store never blocks
/// deletion of a referenced application or authorization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    /// Engine-assigned unique identifier.
    #[serde(default)]
    pub id: String,

    /// Identifier of the application the token was issued to.
    #[serde(default)]
    pub application_id: String,

    /// Identifier of the authorization the token was issued under, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization_id: Option<String>,

    /// Subject (user) identifier, if the token is bound to one.
    #[serde(default)]
    pub subject: String,

    /// Token kind ("access_token", "refresh_token", ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// Status ("valid", "redeemed", "revoked", ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    /// When the token was created.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<OffsetDateTime>,

    /// When the token expires. Unset means the token carries no expiration
    /// of its own and is always considered expired by the retention pruner.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<OffsetDateTime>,

    /// When the token was redeemed, for single-use tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redemption_date: Option<OffsetDateTime>,

    /// Reference identifier for reference tokens (the value handed to the
    /// client when the payload itself stays server-side). Unique when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<String>,

    /// Token payload (ciphertext for reference tokens).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,

    /// Opaque caller-defined properties, stored verbatim.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<serde_json::Value>,

    /// Engine-assigned optimistic concurrency token.
    #[serde(default)]
    pub concurrency_token: String,
}

impl Token {
    /// Returns `true` when the token has an expiration date in the future
    /// relative to `now`.
    #[must_use]
    pub fn is_live_at(&self, now: OffsetDateTime) -> bool {
        match self.expiration_date {
            Some(expiration) => expiration > now,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    #[test]
    fn test_is_live_at() {
        let now = OffsetDateTime::now_utc();
        let mut token = Token::default();
        // No expiration date: never live.
        assert!(!token.is_live_at(now));

        token.expiration_date = Some(now + Duration::hours(1));
        assert!(token.is_live_at(now));

        token.expiration_date = Some(now - Duration::seconds(1));
        assert!(!token.is_live_at(now));
    }
}

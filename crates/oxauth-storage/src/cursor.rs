//! Opaque continuation cursors.
//!
//! The substrate pages query and scan results with forward-only
//! continuation state (DynamoDB's `LastEvaluatedKey`). Callers hold that
//! state as an opaque, serializable token; no cursor state lives server
//! side, so pager instances can be shared freely across concurrent callers.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{StorageError, StorageResult};

/// An opaque continuation cursor.
///
/// Internally a base64url-encoded JSON object describing the last evaluated
/// key, but callers must treat it as a black box: its layout is
/// backend-specific and may change between releases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    /// Encodes a last-evaluated-key object into a cursor.
    #[must_use]
    pub fn encode(key: &Map<String, Value>) -> Self {
        let bytes = serde_json::to_vec(&Value::Object(key.clone()))
            .unwrap_or_default();
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Decodes the cursor back into a last-evaluated-key object.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` when the token was not produced by this
    /// engine (corrupt base64 or JSON).
    pub fn decode(&self) -> StorageResult<Map<String, Value>> {
        let bytes = URL_SAFE_NO_PAD.decode(&self.0).map_err(|_| {
            StorageError::invalid_argument("cursor", "malformed continuation token")
        })?;
        match serde_json::from_slice(&bytes) {
            Ok(Value::Object(map)) => Ok(map),
            _ => Err(StorageError::invalid_argument(
                "cursor",
                "malformed continuation token",
            )),
        }
    }

    /// Returns the raw token text (for transport in query strings etc.).
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Cursor {
    fn from(value: String) -> Self {
        Self(value)
    }
}

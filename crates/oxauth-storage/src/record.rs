//! The tagged-union record type exchanged with the key-value substrate.
//!
//! Heterogeneous entity kinds coexist in one table, so the storage boundary
//! works on a single generic row shape: a `(PK, SK)` key, a kind
//! discriminator, and a sparse attribute map. Each entity store only reads
//! and writes the attributes its kind owns; attributes that feed shared
//! indexes are simply absent on kinds that do not populate them.

use serde_json::{Map, Value};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::error::{StorageError, StorageResult};
use crate::schema::{ATTR_KIND, ATTR_PK, ATTR_SK};

/// Kind discriminator stored on every record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Application,
    Authorization,
    Scope,
    Token,
    /// Derived projection mirroring one application redirect URI.
    RedirectProjection,
    /// Derived projection mirroring one scope resource.
    ResourceProjection,
}

impl RecordKind {
    /// Returns the stored discriminator value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Application => "APPLICATION",
            Self::Authorization => "AUTHORIZATION",
            Self::Scope => "SCOPE",
            Self::Token => "TOKEN",
            Self::RedirectProjection => "REDIRECT_PROJECTION",
            Self::ResourceProjection => "RESOURCE_PROJECTION",
        }
    }

    /// Returns a lowercase label for error messages and log fields.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Application => "application",
            Self::Authorization => "authorization",
            Self::Scope => "scope",
            Self::Token => "token",
            Self::RedirectProjection => "redirect projection",
            Self::ResourceProjection => "resource projection",
        }
    }

    /// Parses a stored discriminator value.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "APPLICATION" => Some(Self::Application),
            "AUTHORIZATION" => Some(Self::Authorization),
            "SCOPE" => Some(Self::Scope),
            "TOKEN" => Some(Self::Token),
            "REDIRECT_PROJECTION" => Some(Self::RedirectProjection),
            "RESOURCE_PROJECTION" => Some(Self::ResourceProjection),
            _ => None,
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single row at the storage boundary.
///
/// `attrs` holds everything except the primary key, JSON-typed: the
/// backends map these values onto their native attribute representation.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Partition key.
    pub pk: String,
    /// Sort key.
    pub sk: String,
    /// Sparse attribute set (kind discriminator included).
    pub attrs: Map<String, Value>,
}

impl Record {
    /// Creates an empty record of the given kind.
    #[must_use]
    pub fn new(pk: impl Into<String>, sk: impl Into<String>, kind: RecordKind) -> Self {
        let mut attrs = Map::new();
        attrs.insert(ATTR_KIND.to_string(), Value::String(kind.as_str().to_string()));
        Self {
            pk: pk.into(),
            sk: sk.into(),
            attrs,
        }
    }

    /// Returns the record's kind discriminator, if present and well-formed.
    #[must_use]
    pub fn kind(&self) -> Option<RecordKind> {
        self.get_str(ATTR_KIND).and_then(RecordKind::parse)
    }

    /// Sets a string attribute.
    pub fn set_str(&mut self, name: &str, value: impl Into<String>) {
        self.attrs.insert(name.to_string(), Value::String(value.into()));
    }

    /// Sets a string attribute when the value is non-empty; clears it
    /// otherwise (sparse index attributes must be absent, not empty, so the
    /// record never surfaces in an index it does not belong to).
    pub fn set_sparse_str(&mut self, name: &str, value: &str) {
        if value.is_empty() {
            self.attrs.remove(name);
        } else {
            self.set_str(name, value);
        }
    }

    /// Sets an RFC 3339 timestamp attribute.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRecord` if the timestamp cannot be formatted.
    pub fn set_time(&mut self, name: &str, value: OffsetDateTime) -> StorageResult<()> {
        let text = value.format(&Rfc3339).map_err(|e| {
            StorageError::invalid_record(format!("cannot format `{name}`: {e}"))
        })?;
        self.set_str(name, text);
        Ok(())
    }

    /// Sets an arbitrary JSON attribute.
    pub fn set_json(&mut self, name: &str, value: Value) {
        self.attrs.insert(name.to_string(), value);
    }

    /// Returns a string attribute.
    #[must_use]
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).and_then(Value::as_str)
    }

    /// Returns an RFC 3339 timestamp attribute.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRecord` if the attribute is present but malformed.
    pub fn get_time(&self, name: &str) -> StorageResult<Option<OffsetDateTime>> {
        match self.get_str(name) {
            None => Ok(None),
            Some(text) => OffsetDateTime::parse(text, &Rfc3339).map(Some).map_err(|e| {
                StorageError::invalid_record(format!("cannot parse `{name}`: {e}"))
            }),
        }
    }

    /// Returns an arbitrary JSON attribute.
    #[must_use]
    pub fn get_json(&self, name: &str) -> Option<&Value> {
        self.attrs.get(name)
    }

    /// Converts the record into a flat JSON object including the primary
    /// key, the shape backends and cursors exchange.
    #[must_use]
    pub fn to_item(&self) -> Map<String, Value> {
        let mut item = self.attrs.clone();
        item.insert(ATTR_PK.to_string(), Value::String(self.pk.clone()));
        item.insert(ATTR_SK.to_string(), Value::String(self.sk.clone()));
        item
    }

    /// Rebuilds a record from a flat JSON object.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRecord` if the primary key attributes are missing.
    pub fn from_item(mut item: Map<String, Value>) -> StorageResult<Self> {
        let pk = match item.remove(ATTR_PK) {
            Some(Value::String(s)) => s,
            _ => return Err(StorageError::invalid_record("missing PK attribute")),
        };
        let sk = match item.remove(ATTR_SK) {
            Some(Value::String(s)) => s,
            _ => return Err(StorageError::invalid_record("missing SK attribute")),
        };
        Ok(Self { pk, sk, attrs: item })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_new_record_carries_kind() {
        let record = Record::new("APPLICATION#1", "APPLICATION", RecordKind::Application);
        assert_eq!(record.kind(), Some(RecordKind::Application));
        assert_eq!(record.get_str(ATTR_KIND), Some("APPLICATION"));
    }

    #[test]
    fn test_kind_parse_roundtrip() {
        for kind in [
            RecordKind::Application,
            RecordKind::Authorization,
            RecordKind::Scope,
            RecordKind::Token,
            RecordKind::RedirectProjection,
            RecordKind::ResourceProjection,
        ] {
            assert_eq!(RecordKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(RecordKind::parse("BOGUS"), None);
    }

    #[test]
    fn test_sparse_str_absent_when_empty() {
        let mut record = Record::new("TOKEN#1", "TOKEN", RecordKind::Token);
        record.set_sparse_str("Subject", "alice");
        assert_eq!(record.get_str("Subject"), Some("alice"));
        record.set_sparse_str("Subject", "");
        assert!(record.get_str("Subject").is_none());
    }

    #[test]
    fn test_time_roundtrip() {
        let mut record = Record::new("TOKEN#1", "TOKEN", RecordKind::Token);
        let when = datetime!(2024-05-01 12:30:00 UTC);
        record.set_time("CreationDate", when).unwrap();
        assert_eq!(record.get_time("CreationDate").unwrap(), Some(when));
        assert_eq!(record.get_time("ExpirationDate").unwrap(), None);
    }

    #[test]
    fn test_item_roundtrip() {
        let mut record = Record::new("SCOPE#1", "SCOPE", RecordKind::Scope);
        record.set_str("ScopeName", "openid");
        let item = record.to_item();
        assert_eq!(item.get("PK").and_then(|v| v.as_str()), Some("SCOPE#1"));
        let rebuilt = Record::from_item(item).unwrap();
        assert_eq!(rebuilt, record);
    }

    #[test]
    fn test_item_missing_key_is_invalid() {
        let item = Map::new();
        assert!(matches!(
            Record::from_item(item),
            Err(StorageError::InvalidRecord { .. })
        ));
    }
}

//! Record codecs for the four entity kinds.
//!
//! Every record stores the complete entity under the `Document` attribute;
//! the sparse top-level attributes exist only to feed the shared secondary
//! indexes and are re-derived from the entity on every write. Decoding reads
//! the document alone, so index attributes can evolve without a migration.

use serde::Serialize;
use serde::de::DeserializeOwned;

use oxauth_core::{Application, Authorization, Scope, Token};
use oxauth_storage::keys::{self, KEY_SEPARATOR};
use oxauth_storage::schema::{
    ATTR_APPLICATION_ID, ATTR_AUTHORIZATION_ID, ATTR_CLIENT_ID, ATTR_CONCURRENCY_TOKEN,
    ATTR_CREATION_DATE, ATTR_DOCUMENT, ATTR_REFERENCE_ID, ATTR_SCOPE_NAME, ATTR_SEARCH_KEY,
    ATTR_SUBJECT,
};
use oxauth_storage::{Record, RecordKind, StorageError, StorageResult};

use crate::artifact::Artifact;

/// Derived compound lookup key for subject + application queries. Only
/// present when both halves are known, so the record stays out of the
/// compound index otherwise.
pub(crate) fn search_key(subject: &str, application_id: &str) -> String {
    format!("{subject}{KEY_SEPARATOR}{application_id}")
}

fn empty_record<T: Artifact>(entity: &T) -> Record {
    Record::new(
        keys::entity_pk(T::KIND, entity.id()),
        keys::entity_sk(T::KIND),
        T::KIND,
    )
}

fn encode_document<T: Serialize>(record: &mut Record, entity: &T) -> StorageResult<()> {
    let document = serde_json::to_value(entity)
        .map_err(|e| StorageError::invalid_record(format!("cannot encode document: {e}")))?;
    record.set_json(ATTR_DOCUMENT, document);
    Ok(())
}

fn decode_document<T: DeserializeOwned>(record: &Record) -> StorageResult<T> {
    let document = record
        .get_json(ATTR_DOCUMENT)
        .cloned()
        .ok_or_else(|| StorageError::invalid_record("missing Document attribute"))?;
    serde_json::from_value(document)
        .map_err(|e| StorageError::invalid_record(format!("cannot decode document: {e}")))
}

impl Artifact for Application {
    const KIND: RecordKind = RecordKind::Application;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn concurrency_token(&self) -> &str {
        &self.concurrency_token
    }

    fn set_concurrency_token(&mut self, token: String) {
        self.concurrency_token = token;
    }

    fn to_record(&self) -> StorageResult<Record> {
        let mut record = empty_record(self);
        encode_document(&mut record, self)?;
        record.set_str(ATTR_CONCURRENCY_TOKEN, self.concurrency_token.as_str());
        record.set_sparse_str(ATTR_APPLICATION_ID, &self.id);
        record.set_sparse_str(ATTR_CLIENT_ID, &self.client_id);
        Ok(record)
    }

    fn from_record(record: &Record) -> StorageResult<Self> {
        decode_document(record)
    }
}

impl Artifact for Authorization {
    const KIND: RecordKind = RecordKind::Authorization;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn concurrency_token(&self) -> &str {
        &self.concurrency_token
    }

    fn set_concurrency_token(&mut self, token: String) {
        self.concurrency_token = token;
    }

    fn to_record(&self) -> StorageResult<Record> {
        let mut record = empty_record(self);
        encode_document(&mut record, self)?;
        record.set_str(ATTR_CONCURRENCY_TOKEN, self.concurrency_token.as_str());
        record.set_sparse_str(ATTR_APPLICATION_ID, &self.application_id);
        record.set_sparse_str(ATTR_SUBJECT, &self.subject);
        if !self.subject.is_empty() && !self.application_id.is_empty() {
            record.set_str(
                ATTR_SEARCH_KEY,
                search_key(&self.subject, &self.application_id),
            );
        }
        if let Some(when) = self.creation_date {
            record.set_time(ATTR_CREATION_DATE, when)?;
        }
        Ok(record)
    }

    fn from_record(record: &Record) -> StorageResult<Self> {
        decode_document(record)
    }
}

impl Artifact for Scope {
    const KIND: RecordKind = RecordKind::Scope;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn concurrency_token(&self) -> &str {
        &self.concurrency_token
    }

    fn set_concurrency_token(&mut self, token: String) {
        self.concurrency_token = token;
    }

    fn to_record(&self) -> StorageResult<Record> {
        let mut record = empty_record(self);
        encode_document(&mut record, self)?;
        record.set_str(ATTR_CONCURRENCY_TOKEN, self.concurrency_token.as_str());
        record.set_sparse_str(ATTR_SCOPE_NAME, &self.name);
        Ok(record)
    }

    fn from_record(record: &Record) -> StorageResult<Self> {
        decode_document(record)
    }
}

impl Artifact for Token {
    const KIND: RecordKind = RecordKind::Token;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn concurrency_token(&self) -> &str {
        &self.concurrency_token
    }

    fn set_concurrency_token(&mut self, token: String) {
        self.concurrency_token = token;
    }

    fn to_record(&self) -> StorageResult<Record> {
        let mut record = empty_record(self);
        encode_document(&mut record, self)?;
        record.set_str(ATTR_CONCURRENCY_TOKEN, self.concurrency_token.as_str());
        record.set_sparse_str(ATTR_APPLICATION_ID, &self.application_id);
        record.set_sparse_str(ATTR_SUBJECT, &self.subject);
        if !self.subject.is_empty() && !self.application_id.is_empty() {
            record.set_str(
                ATTR_SEARCH_KEY,
                search_key(&self.subject, &self.application_id),
            );
        }
        if let Some(authorization_id) = &self.authorization_id {
            record.set_sparse_str(ATTR_AUTHORIZATION_ID, authorization_id);
        }
        if let Some(reference_id) = &self.reference_id {
            record.set_sparse_str(ATTR_REFERENCE_ID, reference_id);
        }
        if let Some(when) = self.creation_date {
            record.set_time(ATTR_CREATION_DATE, when)?;
        }
        Ok(record)
    }

    fn from_record(record: &Record) -> StorageResult<Self> {
        decode_document(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_search_key_shape() {
        assert_eq!(search_key("alice", "app-1"), "alice#app-1");
    }

    #[test]
    fn test_application_record_roundtrip() {
        let mut app = Application::new("client-1");
        app.id = "a-1".to_string();
        app.concurrency_token = "v1".to_string();
        app.redirect_uris.push("https://a/x".to_string());

        let record = app.to_record().unwrap();
        assert_eq!(record.pk, "APPLICATION#a-1");
        assert_eq!(record.sk, "APPLICATION");
        assert_eq!(record.kind(), Some(RecordKind::Application));
        assert_eq!(record.get_str(ATTR_CLIENT_ID), Some("client-1"));
        assert_eq!(record.get_str(ATTR_CONCURRENCY_TOKEN), Some("v1"));

        assert_eq!(Application::from_record(&record).unwrap(), app);
    }

    #[test]
    fn test_token_index_attributes_are_sparse() {
        let mut token = Token::default();
        token.id = "t-1".to_string();
        token.application_id = "a-1".to_string();
        token.concurrency_token = "v1".to_string();

        // No subject: SearchKey must be absent so the compound index stays
        // sparse.
        let record = token.to_record().unwrap();
        assert!(record.get_str(ATTR_SEARCH_KEY).is_none());
        assert!(record.get_str(ATTR_AUTHORIZATION_ID).is_none());
        assert!(record.get_str(ATTR_REFERENCE_ID).is_none());

        token.subject = "alice".to_string();
        token.authorization_id = Some("auth-1".to_string());
        token.reference_id = Some("ref-1".to_string());
        token.creation_date = Some(datetime!(2024-05-01 00:00:00 UTC));
        let record = token.to_record().unwrap();
        assert_eq!(record.get_str(ATTR_SEARCH_KEY), Some("alice#a-1"));
        assert_eq!(record.get_str(ATTR_AUTHORIZATION_ID), Some("auth-1"));
        assert_eq!(record.get_str(ATTR_REFERENCE_ID), Some("ref-1"));
        assert_eq!(
            record.get_time(ATTR_CREATION_DATE).unwrap(),
            Some(datetime!(2024-05-01 00:00:00 UTC))
        );
    }

    #[test]
    fn test_missing_document_is_invalid() {
        let record = Record::new("SCOPE#s-1", "SCOPE", RecordKind::Scope);
        assert!(matches!(
            Scope::from_record(&record),
            Err(StorageError::InvalidRecord { .. })
        ));
    }
}

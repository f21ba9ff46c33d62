//! Conversions between the generic record shape and native DynamoDB items.
//!
//! Record attributes are JSON-typed; the mapping onto `AttributeValue` is
//! the natural one (strings to S, numbers to N, objects to M, and so on).
//! Binary and set-typed attributes never occur in this schema and are
//! dropped on read rather than failing the whole item.

use std::collections::HashMap;

use aws_sdk_dynamodb::types::AttributeValue;
use serde_json::{Map, Number, Value};

use oxauth_storage::{Cursor, Record, StorageError, StorageResult};

/// Converts one JSON value to its DynamoDB attribute representation.
pub(crate) fn json_to_attr(value: &Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(flag) => AttributeValue::Bool(*flag),
        Value::Number(number) => AttributeValue::N(number.to_string()),
        Value::String(text) => AttributeValue::S(text.clone()),
        Value::Array(items) => AttributeValue::L(items.iter().map(json_to_attr).collect()),
        Value::Object(map) => AttributeValue::M(
            map.iter()
                .map(|(name, value)| (name.clone(), json_to_attr(value)))
                .collect(),
        ),
    }
}

/// Converts one DynamoDB attribute back to JSON. Returns `None` for types
/// this schema never writes (binary, sets).
pub(crate) fn attr_to_json(attr: &AttributeValue) -> Option<Value> {
    match attr {
        AttributeValue::Null(_) => Some(Value::Null),
        AttributeValue::Bool(flag) => Some(Value::Bool(*flag)),
        AttributeValue::S(text) => Some(Value::String(text.clone())),
        AttributeValue::N(number) => {
            if let Ok(integer) = number.parse::<i64>() {
                Some(Value::Number(integer.into()))
            } else {
                number
                    .parse::<f64>()
                    .ok()
                    .and_then(Number::from_f64)
                    .map(Value::Number)
            }
        }
        AttributeValue::L(items) => {
            Some(Value::Array(items.iter().filter_map(attr_to_json).collect()))
        }
        AttributeValue::M(map) => Some(Value::Object(
            map.iter()
                .filter_map(|(name, value)| attr_to_json(value).map(|v| (name.clone(), v)))
                .collect(),
        )),
        _ => None,
    }
}

/// Converts a record (primary key included) to a DynamoDB item.
pub(crate) fn record_to_item(record: &Record) -> HashMap<String, AttributeValue> {
    record
        .to_item()
        .iter()
        .map(|(name, value)| (name.clone(), json_to_attr(value)))
        .collect()
}

/// Rebuilds a record from a DynamoDB item.
///
/// # Errors
///
/// Returns `InvalidRecord` when the primary key attributes are missing.
pub(crate) fn item_to_record(item: &HashMap<String, AttributeValue>) -> StorageResult<Record> {
    let map: Map<String, Value> = item
        .iter()
        .filter_map(|(name, value)| attr_to_json(value).map(|v| (name.clone(), v)))
        .collect();
    Record::from_item(map)
}

/// Wraps a `LastEvaluatedKey` in an opaque continuation cursor.
pub(crate) fn key_to_cursor(key: &HashMap<String, AttributeValue>) -> Cursor {
    let map: Map<String, Value> = key
        .iter()
        .filter_map(|(name, value)| attr_to_json(value).map(|v| (name.clone(), v)))
        .collect();
    Cursor::encode(&map)
}

/// Unwraps a continuation cursor back into an `ExclusiveStartKey`.
///
/// # Errors
///
/// Returns `InvalidArgument` when the cursor was not produced by this
/// backend.
pub(crate) fn cursor_to_key(cursor: &Cursor) -> StorageResult<HashMap<String, AttributeValue>> {
    let map = cursor.decode()?;
    if map.is_empty() {
        return Err(StorageError::invalid_argument(
            "cursor",
            "malformed continuation token",
        ));
    }
    Ok(map
        .iter()
        .map(|(name, value)| (name.clone(), json_to_attr(value)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxauth_storage::RecordKind;
    use oxauth_storage::schema::{ATTR_DOCUMENT, ATTR_PK, ATTR_SK};
    use serde_json::json;

    #[test]
    fn test_json_attr_roundtrip() {
        let value = json!({
            "text": "hello",
            "count": 42,
            "ratio": 0.5,
            "flag": true,
            "nothing": null,
            "nested": {"list": [1, "two", false]}
        });
        let attr = json_to_attr(&value);
        assert_eq!(attr_to_json(&attr), Some(value));
    }

    #[test]
    fn test_record_item_roundtrip() {
        let mut record = Record::new("TOKEN#t-1", "TOKEN", RecordKind::Token);
        record.set_str("Subject", "alice");
        record.set_json(ATTR_DOCUMENT, json!({"id": "t-1", "subject": "alice"}));

        let item = record_to_item(&record);
        assert_eq!(item.get(ATTR_PK), Some(&AttributeValue::S("TOKEN#t-1".into())));
        assert_eq!(item.get(ATTR_SK), Some(&AttributeValue::S("TOKEN".into())));

        let rebuilt = item_to_record(&item).unwrap();
        assert_eq!(rebuilt, record);
    }

    #[test]
    fn test_item_without_key_is_invalid() {
        let item = HashMap::from([("Subject".to_string(), AttributeValue::S("alice".into()))]);
        assert!(matches!(
            item_to_record(&item),
            Err(StorageError::InvalidRecord { .. })
        ));
    }

    #[test]
    fn test_cursor_wraps_last_evaluated_key() {
        let key = HashMap::from([
            (ATTR_PK.to_string(), AttributeValue::S("TOKEN#t-1".into())),
            (ATTR_SK.to_string(), AttributeValue::S("TOKEN".into())),
        ]);
        let cursor = key_to_cursor(&key);
        assert_eq!(cursor_to_key(&cursor).unwrap(), key);
    }

    #[test]
    fn test_empty_cursor_rejected() {
        let cursor = Cursor::encode(&Map::new());
        assert!(matches!(
            cursor_to_key(&cursor),
            Err(StorageError::InvalidArgument { .. })
        ));
    }
}

//! Backend configuration.

use serde::{Deserialize, Serialize};

use oxauth_storage::TableOptions;

/// DynamoDB backend configuration.
///
/// The client inherits everything else (credentials, HTTP client, retry
/// policy) from the shared `aws_config::SdkConfig`; the fields here are
/// per-backend overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DynamoConfig {
    /// Table and index naming.
    pub table: TableOptions,
    /// AWS region override (SDK default when unset).
    pub region: Option<String>,
    /// Endpoint override, e.g. DynamoDB Local or LocalStack.
    pub endpoint: Option<String>,
    /// Operation timeout in milliseconds.
    pub timeout_ms: Option<u64>,
}

impl DynamoConfig {
    /// Creates a configuration for the given table name with defaults
    /// everywhere else.
    #[must_use]
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table: TableOptions::new(table_name),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: DynamoConfig =
            serde_json::from_str(r#"{"table": {"tableName": "authz"}}"#).unwrap();
        assert_eq!(config.table.table_name, "authz");
        assert!(config.region.is_none());
        assert!(config.endpoint.is_none());

        let config: DynamoConfig =
            serde_json::from_str(r#"{"endpoint": "http://localhost:8000"}"#).unwrap();
        assert_eq!(config.table.table_name, "oxauth");
        assert_eq!(config.endpoint.as_deref(), Some("http://localhost:8000"));
    }
}

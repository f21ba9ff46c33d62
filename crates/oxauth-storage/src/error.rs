//! Error types for the OxAuth storage boundary.
//!
//! The taxonomy is deliberately small and caller-facing: every failure
//! carries enough context (parameter name, entity kind, id) to pinpoint the
//! violated precondition, and nothing is swallowed. The engine performs no
//! internal retry or backoff; `Unavailable` is propagated as-is.

use std::fmt;

/// Result alias used across the storage and store crates.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A required argument was missing or empty.
    #[error("Invalid argument `{parameter}`: {message}")]
    InvalidArgument {
        /// Name of the offending parameter.
        parameter: String,
        /// Description of what was wrong with it.
        message: String,
    },

    /// The update/delete target does not exist.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Entity kind (e.g. "application").
        kind: String,
        /// Identifier that was not found.
        id: String,
    },

    /// A create collided with an existing primary key.
    #[error("{kind} already exists: {id}")]
    DuplicateKey {
        /// Entity kind.
        kind: String,
        /// Identifier that already exists.
        id: String,
    },

    /// An update carried a stale concurrency token; the caller must reload
    /// and retry (or abort). The stored record was left unchanged.
    #[error("Concurrency conflict on {kind} {id}: stale concurrency token")]
    ConcurrencyConflict {
        /// Entity kind.
        kind: String,
        /// Identifier of the contested record.
        id: String,
    },

    /// The requested lookup is outside the fixed, index-backed set this
    /// engine supports. Never partially honored.
    #[error("Unsupported operation: {message}")]
    UnsupportedOperation {
        /// Description of the unsupported request.
        message: String,
    },

    /// Offset pagination was requested without a valid preceding page.
    #[error("Unsupported pagination: {message}")]
    UnsupportedPagination {
        /// Description of the invalid paging request.
        message: String,
    },

    /// A stored record could not be decoded into its entity shape.
    #[error("Invalid record: {message}")]
    InvalidRecord {
        /// Description of the decode failure.
        message: String,
    },

    /// A conditional write failed its condition. Backend-internal: the
    /// engine re-reads the primary key to classify this as `DuplicateKey`,
    /// `NotFound` or `ConcurrencyConflict` before it reaches a caller.
    #[error("Conditional write failed")]
    ConditionFailed,

    /// The underlying store call failed transiently.
    #[error("Store unavailable: {message}")]
    Unavailable {
        /// Description of the transport/store failure.
        message: String,
    },
}

impl StorageError {
    /// Creates a new `InvalidArgument` error.
    #[must_use]
    pub fn invalid_argument(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Creates a new `NotFound` error.
    #[must_use]
    pub fn not_found(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// Creates a new `DuplicateKey` error.
    #[must_use]
    pub fn duplicate_key(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self::DuplicateKey {
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// Creates a new `ConcurrencyConflict` error.
    #[must_use]
    pub fn concurrency_conflict(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self::ConcurrencyConflict {
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// Creates a new `UnsupportedOperation` error.
    #[must_use]
    pub fn unsupported_operation(message: impl Into<String>) -> Self {
        Self::UnsupportedOperation {
            message: message.into(),
        }
    }

    /// Creates a new `UnsupportedPagination` error.
    #[must_use]
    pub fn unsupported_pagination(message: impl Into<String>) -> Self {
        Self::UnsupportedPagination {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidRecord` error.
    #[must_use]
    pub fn invalid_record(message: impl Into<String>) -> Self {
        Self::InvalidRecord {
            message: message.into(),
        }
    }

    /// Creates a new `Unavailable` error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a not found error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` if this is a concurrency conflict.
    #[must_use]
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict { .. })
    }

    /// Returns `true` if this is a duplicate key error.
    #[must_use]
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, Self::DuplicateKey { .. })
    }

    /// Returns `true` if this is an unsupported pagination error.
    #[must_use]
    pub fn is_unsupported_pagination(&self) -> bool {
        matches!(self, Self::UnsupportedPagination { .. })
    }

    /// Returns the error category for logging purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidArgument { .. } => ErrorCategory::Validation,
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::DuplicateKey { .. } | Self::ConcurrencyConflict { .. } | Self::ConditionFailed => {
                ErrorCategory::Conflict
            }
            Self::UnsupportedOperation { .. } | Self::UnsupportedPagination { .. } => {
                ErrorCategory::Unsupported
            }
            Self::InvalidRecord { .. } => ErrorCategory::Internal,
            Self::Unavailable { .. } => ErrorCategory::Infrastructure,
        }
    }
}

/// Categories of storage errors for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Argument validation failure.
    Validation,
    /// Target record not found.
    NotFound,
    /// Key or version conflict.
    Conflict,
    /// Lookup or paging shape the engine does not support.
    Unsupported,
    /// Infrastructure/transport failure.
    Infrastructure,
    /// Internal error (corrupt record, codec failure).
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::NotFound => write!(f, "not_found"),
            Self::Conflict => write!(f, "conflict"),
            Self::Unsupported => write!(f, "unsupported"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StorageError::not_found("application", "123");
        assert_eq!(err.to_string(), "application not found: 123");

        let err = StorageError::concurrency_conflict("token", "t-1");
        assert_eq!(
            err.to_string(),
            "Concurrency conflict on token t-1: stale concurrency token"
        );

        let err = StorageError::invalid_argument("client_id", "must not be empty");
        assert_eq!(
            err.to_string(),
            "Invalid argument `client_id`: must not be empty"
        );
    }

    #[test]
    fn test_error_predicates() {
        assert!(StorageError::not_found("scope", "s").is_not_found());
        assert!(StorageError::concurrency_conflict("scope", "s").is_concurrency_conflict());
        assert!(StorageError::duplicate_key("scope", "s").is_duplicate_key());
        assert!(!StorageError::duplicate_key("scope", "s").is_not_found());
        assert!(StorageError::unsupported_pagination("offset").is_unsupported_pagination());
    }

    #[test]
    fn test_error_category() {
        assert_eq!(
            StorageError::ConditionFailed.category(),
            ErrorCategory::Conflict
        );
        assert_eq!(
            StorageError::unavailable("boom").category(),
            ErrorCategory::Infrastructure
        );
        assert_eq!(
            StorageError::unsupported_operation("expression query").category(),
            ErrorCategory::Unsupported
        );
        assert_eq!(ErrorCategory::Conflict.to_string(), "conflict");
    }
}

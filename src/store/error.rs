//! Store error taxonomy
//!
//! Every backend failure is converted into one of these variants at the
//! adapter boundary. Backend error types never reach callers.

use thiserror::Error;

use crate::backend::BackendError;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors returned to callers of the key-value operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The backend is unreachable, or no configuration has been supplied yet
    #[error("no such store")]
    NoSuchStore,

    /// The key was never written or has been deleted
    #[error("key not found: {key} in bucket {bucket}")]
    NotFound {
        /// Bucket that was searched
        bucket: String,
        /// Key that was requested
        key: String,
    },

    /// The stored value could not be decoded
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Any other failure
    #[error("{0}")]
    Other(String),
}

impl StoreError {
    /// Build a not-found error for a bucket and key
    pub fn not_found(bucket: &str, key: &str) -> Self {
        StoreError::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        }
    }

    /// Check whether this is a not-found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

impl From<BackendError> for StoreError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Connection(_) => StoreError::NoSuchStore,
            BackendError::Decode(msg) => StoreError::InvalidData(msg),
            BackendError::Query(msg) => StoreError::Other(msg),
        }
    }
}

/// Translate a backend failure for `operation`, logging the original cause.
pub(crate) fn translate(operation: &'static str, bucket: &str, err: BackendError) -> StoreError {
    match &err {
        BackendError::Connection(cause) => {
            tracing::warn!(target: "keyvalue_documentdb::store", operation, bucket, %cause, "Backend unreachable");
        }
        BackendError::Decode(cause) => {
            tracing::warn!(target: "keyvalue_documentdb::store", operation, bucket, %cause, "Stored value could not be decoded");
        }
        BackendError::Query(cause) => {
            tracing::error!(target: "keyvalue_documentdb::store", operation, bucket, %cause, "Backend operation failed");
        }
    }
    err.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translation() {
        assert_eq!(
            StoreError::from(BackendError::Connection("refused".into())),
            StoreError::NoSuchStore
        );
        assert_eq!(
            StoreError::from(BackendError::Decode("bad".into())),
            StoreError::InvalidData("bad".into())
        );
        assert_eq!(
            translate("get", "b", BackendError::Query("write conflict".into())),
            StoreError::Other("write conflict".into())
        );
    }

    #[test]
    fn test_not_found_display() {
        let err = StoreError::not_found("users", "alice");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "key not found: alice in bucket users");
        assert!(!StoreError::NoSuchStore.is_not_found());
    }
}

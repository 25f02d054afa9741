//! Backend capability traits
//!
//! The narrow surface the store adapter needs from a document database:
//! connect, find one, upsert, delete one, count, and key iteration.

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::BackendConfig;

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Error types for backend operations
///
/// Absence of a record is not an error at this level; it surfaces as
/// `Ok(None)` or a zero count.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// The backend could not be reached or the connection could not be set up
    #[error("Connection error: {0}")]
    Connection(String),

    /// A stored document did not have the expected shape
    #[error("Decode error: {0}")]
    Decode(String),

    /// Any other failure reported by the backend
    #[error("Query error: {0}")]
    Query(String),
}

/// One key-value entry as stored in a bucket's collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Key-value namespace the record belongs to
    pub namespace: String,
    /// Key within the namespace
    pub key: String,
    /// Raw value bytes
    pub value: Vec<u8>,
}

/// Selects the record identified by `(key, namespace)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFilter {
    /// Key to match
    pub key: String,
    /// Namespace to match
    pub namespace: String,
}

impl RecordFilter {
    /// Create a filter for a key within a namespace
    pub fn new(key: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            namespace: namespace.into(),
        }
    }
}

/// Connected handle to a document database.
///
/// Collections correspond to buckets and are created on first write.
#[async_trait]
pub trait BackendClient: Send + Sync {
    /// Get the backend type name (e.g., "documentdb", "memory")
    fn backend_type(&self) -> &'static str;

    /// Check that the backend answers
    async fn ping(&self) -> BackendResult<()>;

    /// Value of the record matching the filter, if any
    async fn find_value(
        &self,
        collection: &str,
        filter: &RecordFilter,
    ) -> BackendResult<Option<Vec<u8>>>;

    /// Insert the record or replace the value of the one with the same key and namespace
    async fn upsert(&self, collection: &str, record: &Record) -> BackendResult<()>;

    /// Delete at most one matching record, returning how many were removed
    async fn delete_one(&self, collection: &str, filter: &RecordFilter) -> BackendResult<u64>;

    /// Count matching records (at most 1 is needed for an existence check)
    async fn count(&self, collection: &str, filter: &RecordFilter) -> BackendResult<u64>;

    /// Keys of every record in the namespace
    async fn find_keys(&self, collection: &str, namespace: &str) -> BackendResult<Vec<String>>;

    /// Disconnect, waiting for the client's connections to close
    async fn close(&self) {}
}

/// Creates clients from a backend configuration
#[async_trait]
pub trait BackendConnector: Send + Sync {
    /// Open a client for the given configuration
    async fn connect(&self, config: &BackendConfig) -> BackendResult<Arc<dyn BackendClient>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_display() {
        let err = BackendError::Connection("server selection timeout".to_string());
        assert_eq!(err.to_string(), "Connection error: server selection timeout");

        let err = BackendError::Decode("value is an int32".to_string());
        assert!(err.to_string().starts_with("Decode error"));
    }

    #[test]
    fn test_record_filter_new() {
        let filter = RecordFilter::new("k", String::from("kv"));
        assert_eq!(filter.key, "k");
        assert_eq!(filter.namespace, "kv");
    }
}

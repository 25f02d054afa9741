//! DocumentDB/MongoDB backend
//!
//! Each bucket is a collection in the configured database. Records are
//! stored as:
//!
//! ```text
//! { key: String, store: String, value: Binary, modified_at: i64 }
//! ```
//!
//! where `store` holds the key-value namespace. Values written as BSON
//! strings by older providers are still readable.
//!
//! Enable the `storage-documentdb` feature (on by default) to build it.

use async_trait::async_trait;
use futures_util::TryStreamExt;
use mongodb::{
    bson::{doc, spec::BinarySubtype, Binary, Bson, Document},
    error::{Error as MongoError, ErrorKind},
    options::{ClientOptions, ServerApi, ServerApiVersion},
    Client, Collection,
};
use std::sync::Arc;
use std::time::Duration;

use super::traits::{
    BackendClient, BackendConnector, BackendError, BackendResult, Record, RecordFilter,
};
use crate::config::{BackendConfig, BackendSettings};

const KEY_FIELD: &str = "key";
const NAMESPACE_FIELD: &str = "store";
const VALUE_FIELD: &str = "value";
const MODIFIED_FIELD: &str = "modified_at";

/// Classify a driver error by what the caller can do about it.
fn classify(err: MongoError) -> BackendError {
    match err.kind.as_ref() {
        ErrorKind::ServerSelection { .. }
        | ErrorKind::Io(_)
        | ErrorKind::DnsResolve { .. }
        | ErrorKind::ConnectionPoolCleared { .. }
        | ErrorKind::Authentication { .. } => BackendError::Connection(err.to_string()),
        ErrorKind::BsonDeserialization(_) => BackendError::Decode(err.to_string()),
        _ => BackendError::Query(err.to_string()),
    }
}

/// Connector creating MongoDB clients with the stable server API (V1)
#[derive(Debug, Clone)]
pub struct DocumentDbConnector {
    server_selection_timeout: Duration,
    app_name: String,
}

impl DocumentDbConnector {
    /// Create a connector from backend settings
    pub fn new(settings: &BackendSettings) -> Self {
        Self {
            server_selection_timeout: settings.server_selection_timeout(),
            app_name: settings.app_name.clone(),
        }
    }
}

impl Default for DocumentDbConnector {
    fn default() -> Self {
        Self::new(&BackendSettings::default())
    }
}

#[async_trait]
impl BackendConnector for DocumentDbConnector {
    async fn connect(&self, config: &BackendConfig) -> BackendResult<Arc<dyn BackendClient>> {
        tracing::debug!(
            target: "keyvalue_documentdb::backend",
            link = config.name(),
            uri = %config.redacted_uri(),
            "Connecting to DocumentDB"
        );
        let client = DocumentDbClient::connect(
            config.uri(),
            config.database(),
            self.server_selection_timeout,
            &self.app_name,
        )
        .await?;
        Ok(Arc::new(client))
    }
}

/// DocumentDB/MongoDB client bound to one database
#[derive(Debug, Clone)]
pub struct DocumentDbClient {
    client: Client,
    database_name: String,
}

impl DocumentDbClient {
    /// Create a client
    ///
    /// # Arguments
    /// * `connection_string` - MongoDB/DocumentDB connection string
    /// * `database` - Database holding the bucket collections
    /// * `server_selection_timeout` - How long operations wait for a reachable server
    /// * `app_name` - Application name reported to the server
    pub async fn connect(
        connection_string: &str,
        database: &str,
        server_selection_timeout: Duration,
        app_name: &str,
    ) -> BackendResult<Self> {
        let mut client_options = ClientOptions::parse(connection_string)
            .await
            .map_err(|e| BackendError::Connection(e.to_string()))?;
        client_options.server_api = Some(ServerApi::builder().version(ServerApiVersion::V1).build());
        client_options.server_selection_timeout = Some(server_selection_timeout);
        client_options.app_name = Some(app_name.to_string());

        let client = Client::with_options(client_options)
            .map_err(|e| BackendError::Connection(e.to_string()))?;

        Ok(Self {
            client,
            database_name: database.to_string(),
        })
    }

    /// Get the MongoDB client (for advanced operations)
    pub fn client(&self) -> &Client {
        &self.client
    }

    fn collection(&self, bucket: &str) -> Collection<Document> {
        self.client.database(&self.database_name).collection(bucket)
    }
}

fn filter_doc(filter: &RecordFilter) -> Document {
    doc! { KEY_FIELD: filter.key.as_str(), NAMESPACE_FIELD: filter.namespace.as_str() }
}

fn decode_value(doc: &Document, key: &str) -> BackendResult<Vec<u8>> {
    match doc.get(VALUE_FIELD) {
        Some(Bson::Binary(bin)) => Ok(bin.bytes.clone()),
        Some(Bson::String(s)) => Ok(s.clone().into_bytes()),
        Some(other) => Err(BackendError::Decode(format!(
            "value for {} has unsupported type {:?}",
            key,
            other.element_type()
        ))),
        None => Err(BackendError::Decode(format!("value for {} is missing", key))),
    }
}

#[async_trait]
impl BackendClient for DocumentDbClient {
    fn backend_type(&self) -> &'static str {
        "documentdb"
    }

    async fn ping(&self) -> BackendResult<()> {
        self.client
            .database(&self.database_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn find_value(
        &self,
        collection: &str,
        filter: &RecordFilter,
    ) -> BackendResult<Option<Vec<u8>>> {
        let found = self
            .collection(collection)
            .find_one(filter_doc(filter))
            .projection(doc! { VALUE_FIELD: 1, "_id": 0 })
            .await
            .map_err(classify)?;

        found.map(|doc| decode_value(&doc, &filter.key)).transpose()
    }

    async fn upsert(&self, collection: &str, record: &Record) -> BackendResult<()> {
        let filter = doc! { KEY_FIELD: record.key.as_str(), NAMESPACE_FIELD: record.namespace.as_str() };
        let update = doc! {
            "$set": {
                KEY_FIELD: record.key.as_str(),
                NAMESPACE_FIELD: record.namespace.as_str(),
                VALUE_FIELD: Binary { subtype: BinarySubtype::Generic, bytes: record.value.clone() },
                MODIFIED_FIELD: chrono::Utc::now().timestamp_millis(),
            }
        };

        self.collection(collection)
            .update_one(filter, update)
            .upsert(true)
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn delete_one(&self, collection: &str, filter: &RecordFilter) -> BackendResult<u64> {
        let result = self
            .collection(collection)
            .delete_one(filter_doc(filter))
            .await
            .map_err(classify)?;
        Ok(result.deleted_count)
    }

    async fn count(&self, collection: &str, filter: &RecordFilter) -> BackendResult<u64> {
        self.collection(collection)
            .count_documents(filter_doc(filter))
            .limit(1)
            .await
            .map_err(classify)
    }

    async fn find_keys(&self, collection: &str, namespace: &str) -> BackendResult<Vec<String>> {
        let mut cursor = self
            .collection(collection)
            .find(doc! { NAMESPACE_FIELD: namespace })
            .projection(doc! { KEY_FIELD: 1, "_id": 0 })
            .await
            .map_err(classify)?;

        let mut keys = Vec::new();
        while let Some(doc) = cursor.try_next().await.map_err(classify)? {
            let key = doc
                .get_str(KEY_FIELD)
                .map_err(|_| BackendError::Decode("record without a string key".to_string()))?;
            keys.push(key.to_string());
        }
        Ok(keys)
    }

    async fn close(&self) {
        self.client.clone().shutdown().await;
        tracing::debug!(target: "keyvalue_documentdb::backend", database = %self.database_name, "Client disconnected");
    }
}

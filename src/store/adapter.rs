//! Key-value operations over the active backend configuration.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::context::{deadline_after, OperationContext};
use super::error::{translate, StoreError, StoreResult};
use crate::backend::{ConnectionManager, Lease, Record, RecordFilter};
use crate::config::{BackendConfig, ConfigurationStore};

const TARGET: &str = "keyvalue_documentdb::store";

/// Keys found in a bucket.
///
/// `cursor` is reserved for pagination and is currently always `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyListing {
    /// Every key in the bucket's namespace, sorted
    pub keys: Vec<String>,
    /// Continuation token
    pub cursor: Option<u64>,
}

/// The inbound key-value contract.
///
/// Buckets map to backend collections; keys are scoped to the active
/// configuration's namespace.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Value stored under `key`
    async fn get(&self, ctx: &OperationContext, bucket: &str, key: &str) -> StoreResult<Vec<u8>>;

    /// Store `value` under `key`, replacing any previous value
    async fn set(
        &self,
        ctx: &OperationContext,
        bucket: &str,
        key: &str,
        value: Vec<u8>,
    ) -> StoreResult<()>;

    /// Remove `key`; removing an absent key succeeds
    async fn delete(&self, ctx: &OperationContext, bucket: &str, key: &str) -> StoreResult<()>;

    /// Whether `key` holds a value
    async fn exists(&self, ctx: &OperationContext, bucket: &str, key: &str) -> StoreResult<bool>;

    /// Every key in the bucket; `cursor` is accepted but ignored
    async fn list_keys(
        &self,
        ctx: &OperationContext,
        bucket: &str,
        cursor: Option<u64>,
    ) -> StoreResult<KeyListing>;
}

/// [`KeyValueStore`] backed by whichever configuration is active when each
/// call starts.
///
/// The configuration is read once per call. A reconfiguration that lands
/// mid-call affects only later calls.
#[derive(Debug, Clone)]
pub struct StoreAdapter {
    configs: ConfigurationStore,
    connections: ConnectionManager,
    operation_timeout: Option<Duration>,
}

impl StoreAdapter {
    /// Create an adapter over a configuration store and connection manager
    pub fn new(configs: ConfigurationStore, connections: ConnectionManager) -> Self {
        Self {
            configs,
            connections,
            operation_timeout: None,
        }
    }

    /// Bound every call that arrives without its own deadline
    pub fn with_operation_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.operation_timeout = timeout;
        self
    }

    fn snapshot(&self, operation: &'static str, bucket: &str) -> StoreResult<(Arc<BackendConfig>, u64)> {
        match self.configs.snapshot() {
            Some((config, generation)) => {
                tracing::debug!(target: TARGET, operation, bucket, link = config.name(), "Using configuration");
                Ok((config, generation))
            }
            None => {
                tracing::warn!(target: TARGET, operation, bucket, "No backend configuration active");
                Err(StoreError::NoSuchStore)
            }
        }
    }

    async fn lease(
        &self,
        operation: &'static str,
        bucket: &str,
        config: &BackendConfig,
        generation: u64,
    ) -> StoreResult<Lease> {
        self.connections
            .acquire(config, generation)
            .await
            .map_err(|e| translate(operation, bucket, e))
    }

    async fn bounded<T, F>(&self, ctx: &OperationContext, operation: &'static str, fut: F) -> StoreResult<T>
    where
        F: Future<Output = StoreResult<T>>,
    {
        let deadline = ctx
            .deadline()
            .or_else(|| self.operation_timeout.and_then(deadline_after));

        match ctx.race(deadline, fut).await {
            Ok(result) => result,
            Err(reason) => {
                tracing::warn!(target: TARGET, operation, ?reason, "Operation interrupted");
                Err(reason.into())
            }
        }
    }
}

#[async_trait]
impl KeyValueStore for StoreAdapter {
    async fn get(&self, ctx: &OperationContext, bucket: &str, key: &str) -> StoreResult<Vec<u8>> {
        let (config, generation) = self.snapshot("get", bucket)?;

        self.bounded(ctx, "get", async {
            let client = self.lease("get", bucket, &config, generation).await?;
            let filter = RecordFilter::new(key, config.namespace());
            let found = client.find_value(bucket, &filter).await;
            client.release().await;
            match found {
                Ok(Some(value)) => Ok(value),
                Ok(None) => Err(StoreError::not_found(bucket, key)),
                Err(e) => Err(translate("get", bucket, e)),
            }
        })
        .await
    }

    async fn set(
        &self,
        ctx: &OperationContext,
        bucket: &str,
        key: &str,
        value: Vec<u8>,
    ) -> StoreResult<()> {
        let (config, generation) = self.snapshot("set", bucket)?;

        self.bounded(ctx, "set", async {
            let client = self.lease("set", bucket, &config, generation).await?;
            let record = Record {
                namespace: config.namespace().to_string(),
                key: key.to_string(),
                value,
            };
            let written = client.upsert(bucket, &record).await;
            client.release().await;
            written.map_err(|e| translate("set", bucket, e))
        })
        .await
    }

    async fn delete(&self, ctx: &OperationContext, bucket: &str, key: &str) -> StoreResult<()> {
        let (config, generation) = self.snapshot("delete", bucket)?;

        self.bounded(ctx, "delete", async {
            let client = self.lease("delete", bucket, &config, generation).await?;
            let filter = RecordFilter::new(key, config.namespace());
            let deleted = client.delete_one(bucket, &filter).await;
            client.release().await;
            let deleted = deleted.map_err(|e| translate("delete", bucket, e))?;
            tracing::debug!(target: TARGET, bucket, deleted, "Records deleted");
            Ok(())
        })
        .await
    }

    async fn exists(&self, ctx: &OperationContext, bucket: &str, key: &str) -> StoreResult<bool> {
        let (config, generation) = self.snapshot("exists", bucket)?;

        self.bounded(ctx, "exists", async {
            let client = self.lease("exists", bucket, &config, generation).await?;
            let filter = RecordFilter::new(key, config.namespace());
            let count = client.count(bucket, &filter).await;
            client.release().await;
            let count = count.map_err(|e| translate("exists", bucket, e))?;
            Ok(count > 0)
        })
        .await
    }

    async fn list_keys(
        &self,
        ctx: &OperationContext,
        bucket: &str,
        _cursor: Option<u64>,
    ) -> StoreResult<KeyListing> {
        let (config, generation) = self.snapshot("list_keys", bucket)?;

        self.bounded(ctx, "list_keys", async {
            let client = self.lease("list_keys", bucket, &config, generation).await?;
            let keys = client.find_keys(bucket, config.namespace()).await;
            client.release().await;
            let mut keys = keys.map_err(|e| translate("list_keys", bucket, e))?;
            keys.sort_unstable();
            Ok(KeyListing { keys, cursor: None })
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryConnector;
    use crate::config::{validate, ConnectionMode};
    use std::collections::HashMap;

    fn raw(database: &str, kv: Option<&str>) -> HashMap<String, String> {
        let mut raw: HashMap<String, String> = [("uri", "memory://"), ("database", database)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        if let Some(kv) = kv {
            raw.insert("kv".to_string(), kv.to_string());
        }
        raw
    }

    fn adapter(mode: ConnectionMode) -> (StoreAdapter, ConfigurationStore, MemoryConnector) {
        let connector = MemoryConnector::new();
        let configs = ConfigurationStore::new();
        configs.set_active(validate(&raw("db", None), "link1").unwrap());
        let connections = ConnectionManager::new(Arc::new(connector.clone()), mode);
        (StoreAdapter::new(configs.clone(), connections), configs, connector)
    }

    #[tokio::test]
    async fn test_set_then_get_round_trips() {
        let (store, _, _) = adapter(ConnectionMode::PerCall);
        let ctx = OperationContext::new();
        let value = vec![0u8, 255, 10, 13, 0];

        store.set(&ctx, "b", "k", value.clone()).await.unwrap();
        assert_eq!(store.get(&ctx, "b", "k").await.unwrap(), value);
    }

    #[tokio::test]
    async fn test_last_write_wins_without_duplicates() {
        let (store, _, connector) = adapter(ConnectionMode::Shared);
        let ctx = OperationContext::new();

        store.set(&ctx, "b", "k", b"v1".to_vec()).await.unwrap();
        store.set(&ctx, "b", "k", b"v2".to_vec()).await.unwrap();
        assert_eq!(store.get(&ctx, "b", "k").await.unwrap(), b"v2".to_vec());
        assert_eq!(connector.record_count("db", "b"), 1);
    }

    #[tokio::test]
    async fn test_missing_key() {
        let (store, _, _) = adapter(ConnectionMode::Shared);
        let ctx = OperationContext::new();

        let err = store.get(&ctx, "b", "never").await.unwrap_err();
        assert_eq!(err, StoreError::not_found("b", "never"));
        assert!(!store.exists(&ctx, "b", "never").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let (store, _, _) = adapter(ConnectionMode::Shared);
        let ctx = OperationContext::new();

        store.set(&ctx, "b", "k", b"v".to_vec()).await.unwrap();
        assert!(store.exists(&ctx, "b", "k").await.unwrap());
        store.delete(&ctx, "b", "k").await.unwrap();
        store.delete(&ctx, "b", "k").await.unwrap();
        assert!(!store.exists(&ctx, "b", "k").await.unwrap());
        assert!(store.get(&ctx, "b", "k").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_list_keys_scoped_to_namespace() {
        let (store, configs, _) = adapter(ConnectionMode::Shared);
        let ctx = OperationContext::new();

        for key in ["c", "a", "b"] {
            store.set(&ctx, "b", key, b"1".to_vec()).await.unwrap();
        }
        configs.set_active(validate(&raw("db", Some("other")), "link1").unwrap());
        store.set(&ctx, "b", "z", b"1".to_vec()).await.unwrap();

        let listing = store.list_keys(&ctx, "b", Some(42)).await.unwrap();
        assert_eq!(listing.keys, vec!["z".to_string()]);
        assert_eq!(listing.cursor, None);

        configs.set_active(validate(&raw("db", None), "link1").unwrap());
        let listing = store.list_keys(&ctx, "b", None).await.unwrap();
        assert_eq!(listing.keys, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_unconfigured_is_no_such_store() {
        let connector = MemoryConnector::new();
        let connections = ConnectionManager::new(Arc::new(connector), ConnectionMode::Shared);
        let store = StoreAdapter::new(ConfigurationStore::new(), connections);
        let ctx = OperationContext::new();

        assert_eq!(store.get(&ctx, "b", "k").await, Err(StoreError::NoSuchStore));
        assert_eq!(store.list_keys(&ctx, "b", None).await, Err(StoreError::NoSuchStore));
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_no_such_store() {
        for mode in [ConnectionMode::PerCall, ConnectionMode::Shared] {
            let (store, _, connector) = adapter(mode);
            let ctx = OperationContext::new();
            connector.set_reachable(false);

            assert_eq!(store.get(&ctx, "b", "k").await, Err(StoreError::NoSuchStore));
            assert_eq!(store.set(&ctx, "b", "k", vec![1]).await, Err(StoreError::NoSuchStore));
            assert_eq!(store.delete(&ctx, "b", "k").await, Err(StoreError::NoSuchStore));
            assert_eq!(store.exists(&ctx, "b", "k").await, Err(StoreError::NoSuchStore));
            assert_eq!(store.list_keys(&ctx, "b", None).await, Err(StoreError::NoSuchStore));
        }
    }

    #[tokio::test]
    async fn test_corrupt_value_is_invalid_data() {
        let (store, _, connector) = adapter(ConnectionMode::Shared);
        let ctx = OperationContext::new();

        store.set(&ctx, "b", "k", b"v".to_vec()).await.unwrap();
        connector.corrupt("db", "b", &RecordFilter::new("k", "kv"));
        assert!(matches!(store.get(&ctx, "b", "k").await, Err(StoreError::InvalidData(_))));
        assert!(store.exists(&ctx, "b", "k").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_operation_timeout_applies_without_deadline() {
        let (store, _, connector) = adapter(ConnectionMode::Shared);
        let store = store.with_operation_timeout(Some(Duration::from_secs(2)));
        connector.set_latency(Some(Duration::from_secs(60)));

        let err = store.get(&OperationContext::new(), "b", "k").await.unwrap_err();
        assert_eq!(err, StoreError::Other("deadline exceeded".to_string()));

        let ctx = OperationContext::with_timeout(Duration::from_secs(120));
        assert!(store.get(&ctx, "b", "k").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_per_call_leases_disconnect_after_each_operation() {
        let (store, _, connector) = adapter(ConnectionMode::PerCall);
        let ctx = OperationContext::new();

        store.set(&ctx, "b", "k", b"v".to_vec()).await.unwrap();
        assert!(store.get(&ctx, "b", "missing").await.unwrap_err().is_not_found());
        assert!(store.exists(&ctx, "b", "k").await.unwrap());
        store.list_keys(&ctx, "b", None).await.unwrap();
        store.delete(&ctx, "b", "k").await.unwrap();

        assert_eq!(connector.connect_count(), 5);
        assert_eq!(connector.close_count(), 5);
    }

    #[tokio::test]
    async fn test_oversized_operation_timeout_is_unbounded() {
        let (store, _, _) = adapter(ConnectionMode::Shared);
        let settings = crate::config::BackendSettings {
            operation_timeout_secs: i64::MAX as u64,
            ..Default::default()
        };
        let store = store.with_operation_timeout(settings.operation_timeout());
        let ctx = OperationContext::new();

        assert!(!store.exists(&ctx, "b", "k").await.unwrap());
        store.set(&ctx, "b", "k", b"v".to_vec()).await.unwrap();
        assert!(store.exists(&ctx, "b", "k").await.unwrap());
    }

    #[tokio::test]
    async fn test_reconfiguration_switches_database() {
        let (store, configs, connector) = adapter(ConnectionMode::Shared);
        let ctx = OperationContext::new();
        store.set(&ctx, "b", "k", b"from-db".to_vec()).await.unwrap();

        configs.set_active(validate(&raw("db2", None), "link2").unwrap());
        assert!(store.get(&ctx, "b", "k").await.unwrap_err().is_not_found());
        store.set(&ctx, "b", "k", b"from-db2".to_vec()).await.unwrap();

        assert_eq!(connector.record_count("db", "b"), 1);
        assert_eq!(connector.record_count("db2", "b"), 1);
    }
}

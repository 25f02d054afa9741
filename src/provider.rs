//! Provider assembly
//!
//! Wires one [`ConfigurationStore`] into both the [`StoreAdapter`] (reader)
//! and the [`LinkManager`] (writer), sharing a single [`ConnectionManager`].

use std::sync::Arc;

use crate::backend::{BackendConnector, ConnectionManager};
use crate::config::{BackendSettings, ConfigurationStore, EnvironmentLoader, ValidationError};
use crate::lifecycle::LinkManager;
use crate::store::StoreAdapter;

/// A ready-to-serve key-value provider
#[derive(Debug)]
pub struct KeyValueProvider {
    configs: ConfigurationStore,
    store: StoreAdapter,
    links: LinkManager,
}

impl KeyValueProvider {
    /// Assemble a provider over any backend connector
    pub fn new(connector: Arc<dyn BackendConnector>, settings: &BackendSettings) -> Self {
        let configs = ConfigurationStore::new();
        let connections = ConnectionManager::new(connector, settings.connection_mode);
        let store = StoreAdapter::new(configs.clone(), connections.clone())
            .with_operation_timeout(settings.operation_timeout());
        let links = LinkManager::new(configs.clone(), connections);

        Self {
            configs,
            store,
            links,
        }
    }

    /// Assemble a provider talking to MongoDB/DocumentDB
    #[cfg(feature = "storage-documentdb")]
    pub fn documentdb(settings: &BackendSettings) -> Self {
        let connector = crate::backend::DocumentDbConnector::new(settings);
        Self::new(Arc::new(connector), settings)
    }

    /// Key-value operations
    pub fn store(&self) -> &StoreAdapter {
        &self.store
    }

    /// Link event handling
    pub fn links(&self) -> &LinkManager {
        &self.links
    }

    /// Active configuration holder
    pub fn configuration(&self) -> &ConfigurationStore {
        &self.configs
    }

    /// Apply a link configuration found in the environment.
    ///
    /// Returns `Ok(false)` when the environment supplies nothing, so the
    /// provider waits for a link event instead.
    pub fn seed_from_environment(&self, env: &EnvironmentLoader) -> Result<bool, ValidationError> {
        let raw = env.link_config();
        if raw.is_empty() {
            tracing::debug!(target: "keyvalue_documentdb::lifecycle", "No link configuration in environment");
            return Ok(false);
        }
        self.links.on_configuration_put(&env.link_name(), &raw)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryConnector;
    use crate::store::{KeyValueStore, OperationContext, StoreError};
    use std::collections::HashMap;

    #[tokio::test]
    async fn test_links_feed_the_store() {
        let provider = KeyValueProvider::new(Arc::new(MemoryConnector::new()), &BackendSettings::default());
        let ctx = OperationContext::new();

        assert_eq!(
            provider.store().get(&ctx, "b", "k").await,
            Err(StoreError::NoSuchStore)
        );

        let raw: HashMap<String, String> = [("uri", "memory://"), ("database", "d")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        provider.links().on_configuration_put("link1", &raw).unwrap();

        provider.store().set(&ctx, "b", "k", b"v".to_vec()).await.unwrap();
        assert_eq!(provider.store().get(&ctx, "b", "k").await.unwrap(), b"v".to_vec());
        assert_eq!(provider.configuration().get_active().unwrap().name(), "link1");
    }
}

//! Link lifecycle handling
//!
//! The host announces links (source and target) as they are put and
//! deleted. Target links carry the backend configuration: each put is
//! validated and, when valid, published to the [`ConfigurationStore`] for
//! every subsequent store operation.
//!
//! Deleting a link only drops its bookkeeping record. The last valid
//! configuration stays active so in-flight and later requests keep working.

mod health;

pub use health::HealthStatus;

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::backend::ConnectionManager;
use crate::config::{validate, ConfigurationStore, ValidationError};
use crate::store::OperationContext;

const TARGET: &str = "keyvalue_documentdb::lifecycle";

/// A link as announced by the host
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkDefinition {
    /// Link name; names the configuration source
    pub name: String,
    /// Component on the calling side of the link
    pub source_id: String,
    /// Component on the receiving side of the link
    pub target: String,
    /// Raw configuration (`uri`, `database`, `kv`)
    pub config: HashMap<String, String>,
}

/// Accepts configuration events and publishes validated configuration.
#[derive(Debug)]
pub struct LinkManager {
    configs: ConfigurationStore,
    connections: ConnectionManager,
    /// Target links keyed by source id
    target_links: RwLock<HashMap<String, LinkDefinition>>,
    /// Source links keyed by target
    source_links: RwLock<HashMap<String, LinkDefinition>>,
}

impl LinkManager {
    /// Create a manager publishing into `configs`
    pub fn new(configs: ConfigurationStore, connections: ConnectionManager) -> Self {
        Self {
            configs,
            connections,
            target_links: RwLock::new(HashMap::new()),
            source_links: RwLock::new(HashMap::new()),
        }
    }

    /// Validate `raw` and make it the active configuration.
    ///
    /// On error nothing changes and the previous configuration stays active.
    pub fn on_configuration_put(
        &self,
        source_name: &str,
        raw: &HashMap<String, String>,
    ) -> Result<(), ValidationError> {
        let config = validate(raw, source_name).map_err(|e| {
            tracing::warn!(target: TARGET, link = source_name, error = %e, "Invalid backend configuration, keeping previous");
            e
        })?;

        tracing::info!(target: TARGET, config = %config, "Activating backend configuration");
        self.configs.set_active(config);
        self.connections.retire_before(self.configs.generation());
        Ok(())
    }

    /// Forget the configuration source named `source_name`.
    ///
    /// The active configuration is left in place.
    pub fn on_configuration_delete(&self, source_name: &str) {
        let mut links = self.target_links.write().unwrap_or_else(PoisonError::into_inner);
        let before = links.len();
        links.retain(|_, link| link.name != source_name);
        let removed = before - links.len();

        let still_active = self
            .configs
            .get_active()
            .is_some_and(|c| c.name() == source_name);
        tracing::info!(
            target: TARGET,
            link = source_name,
            removed,
            still_active,
            "Configuration source deleted, last configuration stays active"
        );
    }

    /// Record a target link and apply its configuration
    pub fn put_target_link(&self, link: LinkDefinition) -> Result<(), ValidationError> {
        tracing::info!(target: TARGET, link = %link.name, source_id = %link.source_id, "Handling new target link");
        let name = link.name.clone();
        let config = link.config.clone();
        self.target_links
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(link.source_id.clone(), link);
        self.on_configuration_put(&name, &config)
    }

    /// Forget the target link held for `link.source_id`.
    ///
    /// Other components linked under the same name keep their records, and the
    /// active configuration is left in place.
    pub fn delete_target_link(&self, link: &LinkDefinition) {
        let removed = self
            .target_links
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&link.source_id)
            .is_some();
        tracing::info!(
            target: TARGET,
            link = %link.name,
            source_id = %link.source_id,
            removed,
            "Handling deleted target link, last configuration stays active"
        );
    }

    /// Record a source link. Source links carry no backend configuration.
    pub fn put_source_link(&self, link: LinkDefinition) {
        tracing::info!(target: TARGET, link = %link.name, target_id = %link.target, "Handling new source link");
        self.source_links
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(link.target.clone(), link);
    }

    /// Forget a source link
    pub fn delete_source_link(&self, link: &LinkDefinition) {
        tracing::info!(target: TARGET, link = %link.name, target_id = %link.target, "Handling deleted source link");
        self.source_links
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&link.target);
    }

    /// Names of the tracked target links, sorted
    pub fn target_links(&self) -> Vec<String> {
        let links = self.target_links.read().unwrap_or_else(PoisonError::into_inner);
        sorted_names(links.values())
    }

    /// Names of the tracked source links, sorted
    pub fn source_links(&self) -> Vec<String> {
        let links = self.source_links.read().unwrap_or_else(PoisonError::into_inner);
        sorted_names(links.values())
    }

    /// Report whether a configuration is active and its backend answers.
    pub async fn health_check(&self, ctx: &OperationContext) -> HealthStatus {
        let Some((config, generation)) = self.configs.snapshot() else {
            return HealthStatus::unconfigured();
        };

        let check = async {
            let client = self.connections.acquire(&config, generation).await?;
            let answered = client.ping().await;
            client.release().await;
            answered
        };

        let status = match ctx.race(ctx.deadline(), check).await {
            Ok(Ok(())) => HealthStatus::healthy(config.name()),
            Ok(Err(e)) => HealthStatus::unhealthy(config.name(), e.to_string()),
            Err(reason) => HealthStatus::unhealthy(config.name(), format!("{:?}", reason)),
        };
        tracing::debug!(target: TARGET, %status, "Health check");
        status
    }

    /// Release shared backend clients
    pub fn shutdown(&self) {
        tracing::info!(target: TARGET, "Handling shutdown");
        self.connections.invalidate();
    }
}

fn sorted_names<'a>(links: impl Iterator<Item = &'a LinkDefinition>) -> Vec<String> {
    let mut names: Vec<String> = links.map(|l| l.name.clone()).collect();
    names.sort();
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryConnector;
    use crate::config::ConnectionMode;
    use std::sync::Arc;

    fn raw(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn manager() -> (LinkManager, ConfigurationStore, MemoryConnector) {
        let connector = MemoryConnector::new();
        let configs = ConfigurationStore::new();
        let connections = ConnectionManager::new(Arc::new(connector.clone()), ConnectionMode::Shared);
        (LinkManager::new(configs.clone(), connections), configs, connector)
    }

    fn target_link(name: &str, source_id: &str, config: &[(&str, &str)]) -> LinkDefinition {
        LinkDefinition {
            name: name.to_string(),
            source_id: source_id.to_string(),
            target: "kv-provider".to_string(),
            config: raw(config),
        }
    }

    #[test]
    fn test_put_publishes_valid_config() {
        let (links, configs, _) = manager();
        links
            .on_configuration_put("link1", &raw(&[("uri", "memory://"), ("database", "d")]))
            .unwrap();
        let active = configs.get_active().unwrap();
        assert_eq!(active.name(), "link1");
        assert_eq!(active.namespace(), "kv");
    }

    #[test]
    fn test_invalid_put_keeps_previous_config() {
        let (links, configs, _) = manager();
        links
            .on_configuration_put("good", &raw(&[("uri", "memory://"), ("database", "d")]))
            .unwrap();

        let err = links
            .on_configuration_put("bad", &raw(&[("uri", "memory://")]))
            .unwrap_err();
        assert_eq!(err, ValidationError::MissingDatabase);
        assert_eq!(configs.get_active().unwrap().name(), "good");
    }

    #[test]
    fn test_delete_keeps_last_config() {
        let (links, configs, _) = manager();
        links
            .put_target_link(target_link("link1", "component-a", &[("uri", "memory://"), ("database", "d")]))
            .unwrap();
        assert_eq!(links.target_links(), vec!["link1".to_string()]);

        links.delete_target_link(&target_link("link1", "component-a", &[]));
        assert!(links.target_links().is_empty());
        assert_eq!(configs.get_active().unwrap().name(), "link1");

        links.on_configuration_delete("link1");
        assert!(configs.get_active().is_some());
    }

    #[test]
    fn test_delete_target_link_spares_components_sharing_the_name() {
        let (links, configs, _) = manager();
        let backend = [("uri", "memory://"), ("database", "d")];
        links
            .put_target_link(target_link("default", "component-a", &backend))
            .unwrap();
        links
            .put_target_link(target_link("default", "component-b", &backend))
            .unwrap();
        assert_eq!(links.target_links(), vec!["default".to_string(), "default".to_string()]);

        links.delete_target_link(&target_link("default", "component-a", &[]));
        assert_eq!(links.target_links(), vec!["default".to_string()]);
        assert_eq!(configs.get_active().unwrap().name(), "default");

        links.delete_target_link(&target_link("default", "component-b", &[]));
        assert!(links.target_links().is_empty());
    }

    #[test]
    fn test_configuration_delete_forgets_every_link_with_the_name() {
        let (links, configs, _) = manager();
        let backend = [("uri", "memory://"), ("database", "d")];
        links
            .put_target_link(target_link("default", "component-a", &backend))
            .unwrap();
        links
            .put_target_link(target_link("other", "component-b", &backend))
            .unwrap();

        links.on_configuration_delete("default");
        assert_eq!(links.target_links(), vec!["other".to_string()]);
        assert_eq!(configs.get_active().unwrap().name(), "other");
    }

    #[test]
    fn test_invalid_target_link_is_still_tracked() {
        let (links, configs, _) = manager();
        assert!(links
            .put_target_link(target_link("broken", "component-a", &[]))
            .is_err());
        assert_eq!(links.target_links(), vec!["broken".to_string()]);
        assert!(configs.get_active().is_none());
    }

    #[test]
    fn test_source_links_do_not_touch_config() {
        let (links, configs, _) = manager();
        let link = LinkDefinition {
            name: "outbound".to_string(),
            source_id: "kv-provider".to_string(),
            target: "component-b".to_string(),
            config: HashMap::new(),
        };
        links.put_source_link(link.clone());
        assert_eq!(links.source_links(), vec!["outbound".to_string()]);
        assert!(configs.get_active().is_none());

        links.delete_source_link(&link);
        assert!(links.source_links().is_empty());
    }

    #[tokio::test]
    async fn test_health_check() {
        let (links, _, connector) = manager();
        let ctx = OperationContext::new();

        let status = links.health_check(&ctx).await;
        assert!(!status.configured);
        assert!(!status.is_healthy());

        links
            .on_configuration_put("link1", &raw(&[("uri", "memory://"), ("database", "d")]))
            .unwrap();
        let status = links.health_check(&ctx).await;
        assert!(status.is_healthy());
        assert_eq!(status.link.as_deref(), Some("link1"));

        connector.set_reachable(false);
        links.shutdown();
        let status = links.health_check(&ctx).await;
        assert!(status.configured);
        assert!(!status.is_healthy());
    }
}

//! Holder for the active backend configuration.

use std::sync::{Arc, PoisonError, RwLock};

use super::link::BackendConfig;

#[derive(Debug, Default)]
struct Active {
    config: Option<Arc<BackendConfig>>,
    generation: u64,
}

/// Shared, swappable handle to the active [`BackendConfig`].
///
/// Readers take an `Arc` snapshot and keep it for the rest of their
/// operation; writers replace the whole `Arc`. A reader therefore sees either
/// the old configuration or the new one, never a mix of their fields.
///
/// Cloning is cheap and every clone observes the same state.
#[derive(Debug, Clone, Default)]
pub struct ConfigurationStore {
    inner: Arc<RwLock<Active>>,
}

impl ConfigurationStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the active configuration, if any.
    pub fn get_active(&self) -> Option<Arc<BackendConfig>> {
        // The guarded value is only ever replaced whole, so a poisoned lock
        // still holds a consistent snapshot.
        let active = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        active.config.clone()
    }

    /// Snapshot of the active configuration together with its generation.
    pub fn snapshot(&self) -> Option<(Arc<BackendConfig>, u64)> {
        let active = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        active.config.clone().map(|cfg| (cfg, active.generation))
    }

    /// Publish a new configuration, replacing the previous one in full.
    pub fn set_active(&self, config: BackendConfig) {
        let config = Arc::new(config);
        let mut active = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        active.config = Some(config);
        active.generation += 1;
    }

    /// Drop the active configuration. Subsequent operations fail with `NoSuchStore`.
    pub fn clear(&self) {
        let mut active = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if active.config.take().is_some() {
            active.generation += 1;
        }
    }

    /// Number of publishes (and effective clears) so far.
    pub fn generation(&self) -> u64 {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .generation
    }
}

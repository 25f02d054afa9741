//! Client acquisition
//!
//! Store operations lease a client for the duration of one call. In
//! [`ConnectionMode::PerCall`] every lease is a fresh connection that is
//! disconnected when the lease is released. In [`ConnectionMode::Shared`] one client
//! is created lazily per configuration generation and reused until the
//! configuration is replaced.

use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, Mutex, PoisonError};

use super::traits::{BackendClient, BackendConnector, BackendResult};
use crate::config::{BackendConfig, ConnectionMode};

struct CachedClient {
    generation: u64,
    client: Arc<dyn BackendClient>,
}

enum Lookup {
    Hit(Arc<dyn BackendClient>),
    Stale,
    Miss,
}

/// A client held for the duration of one operation.
///
/// [`Lease::release`] disconnects a client opened for this lease alone and
/// only drops the reference to a shared one. A lease that is dropped without
/// being released (an interrupted operation) leaves the driver to close a
/// private client in the background.
pub struct Lease {
    client: Arc<dyn BackendClient>,
    private: bool,
}

impl Lease {
    fn private(client: Arc<dyn BackendClient>) -> Self {
        Self { client, private: true }
    }

    fn shared(client: Arc<dyn BackendClient>) -> Self {
        Self { client, private: false }
    }

    /// Whether the client was opened for this lease alone
    pub fn is_private(&self) -> bool {
        self.private
    }

    /// End the lease, disconnecting a private client
    pub async fn release(self) {
        if self.private {
            self.client.close().await;
        }
    }
}

impl Deref for Lease {
    type Target = dyn BackendClient;

    fn deref(&self) -> &Self::Target {
        self.client.as_ref()
    }
}

/// Hands out backend clients for a configuration snapshot
#[derive(Clone)]
pub struct ConnectionManager {
    connector: Arc<dyn BackendConnector>,
    mode: ConnectionMode,
    cached: Arc<Mutex<Option<CachedClient>>>,
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("mode", &self.mode)
            .field("cached_generation", &self.cached_generation())
            .finish()
    }
}

impl ConnectionManager {
    /// Create a manager over a connector
    pub fn new(connector: Arc<dyn BackendConnector>, mode: ConnectionMode) -> Self {
        Self {
            connector,
            mode,
            cached: Arc::new(Mutex::new(None)),
        }
    }

    /// Connection policy in use
    pub fn mode(&self) -> ConnectionMode {
        self.mode
    }

    /// Lease a client for `config`, which was read at `generation`.
    pub async fn acquire(&self, config: &BackendConfig, generation: u64) -> BackendResult<Lease> {
        if self.mode == ConnectionMode::PerCall {
            let client = self.connector.connect(config).await?;
            return Ok(Lease::private(client));
        }

        let lookup = {
            let cached = self.cached.lock().unwrap_or_else(PoisonError::into_inner);
            match cached.as_ref() {
                Some(c) if c.generation == generation => Lookup::Hit(Arc::clone(&c.client)),
                Some(c) if c.generation > generation => Lookup::Stale,
                _ => Lookup::Miss,
            }
        };

        match lookup {
            Lookup::Hit(client) => return Ok(Lease::shared(client)),
            // Snapshot older than the cached client: serve it without
            // disturbing the cache.
            Lookup::Stale => {
                let client = self.connector.connect(config).await?;
                return Ok(Lease::private(client));
            }
            Lookup::Miss => {}
        }

        // Connect without holding the lock; a concurrent miss may connect
        // too, and the losing client becomes private to its lease.
        let client = self.connector.connect(config).await?;

        let mut cached = self.cached.lock().unwrap_or_else(PoisonError::into_inner);
        let replace = cached.as_ref().map_or(true, |c| c.generation < generation);
        if replace {
            if let Some(old) = cached.as_ref() {
                tracing::info!(
                    target: "keyvalue_documentdb::backend",
                    old_generation = old.generation,
                    new_generation = generation,
                    link = config.name(),
                    "Configuration changed, rebuilding shared client"
                );
            }
            *cached = Some(CachedClient {
                generation,
                client: Arc::clone(&client),
            });
            return Ok(Lease::shared(client));
        }
        Ok(Lease::private(client))
    }

    /// Drop the shared client, if any
    pub fn invalidate(&self) {
        let previous = self
            .cached
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(previous) = previous {
            tracing::debug!(target: "keyvalue_documentdb::backend", generation = previous.generation, "Shared client released");
        }
    }

    /// Drop the shared client if it was built for a generation older than `generation`.
    ///
    /// Leases already handed out keep their client until they drop.
    pub fn retire_before(&self, generation: u64) {
        let mut cached = self.cached.lock().unwrap_or_else(PoisonError::into_inner);
        if cached.as_ref().is_some_and(|c| c.generation < generation) {
            *cached = None;
            tracing::debug!(target: "keyvalue_documentdb::backend", generation, "Retired shared client for replaced configuration");
        }
    }

    /// Generation of the cached shared client
    pub fn cached_generation(&self) -> Option<u64> {
        self.cached
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|c| c.generation)
    }
}

//! Key-value store provider backed by MongoDB/DocumentDB
//!
//! The provider exposes get/set/delete/exists/list-keys over named buckets.
//! Connection parameters are not fixed at startup; they arrive as link
//! configuration and can be replaced while requests are in flight.
//!
//! - **`config`** - Link validation, the active configuration store, settings
//! - **`backend`** - Document database capability traits and clients
//! - **`store`** - The key-value operations and their error taxonomy
//! - **`lifecycle`** - Link events, health checks, shutdown
//! - **`observability`** - Tracing subscriber setup
//!
//! # Features
//!
//! - `storage-documentdb` (default) - MongoDB/DocumentDB client via the `mongodb` crate
//! - `cli` (default) - The `kv-documentdb` binary
//!
//! # Example
//!
//! ```no_run
//! use keyvalue_documentdb::prelude::*;
//! use std::collections::HashMap;
//!
//! async fn example() -> anyhow::Result<()> {
//!     let provider = KeyValueProvider::documentdb(&BackendSettings::default());
//!
//!     let mut link = HashMap::new();
//!     link.insert("uri".to_string(), "mongodb://localhost:27017".to_string());
//!     link.insert("database".to_string(), "app".to_string());
//!     provider.links().on_configuration_put("default", &link)?;
//!
//!     let ctx = OperationContext::new();
//!     provider.store().set(&ctx, "users", "alice", b"admin".to_vec()).await?;
//!     let value = provider.store().get(&ctx, "users", "alice").await?;
//!     assert_eq!(value, b"admin");
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

/// Configuration validation, storage and loading
pub mod config;

/// Backend capability traits and implementations
pub mod backend;

/// Key-value operations
pub mod store;

/// Link lifecycle management
pub mod lifecycle;

/// Logging setup
pub mod observability;

/// Provider assembly
pub mod provider;

/// Command-line front-end (enabled with the `cli` feature)
#[cfg(feature = "cli")]
pub mod cli;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::backend::{BackendClient, BackendConnector, MemoryConnector};
    pub use crate::config::{
        BackendConfig, BackendSettings, ConfigurationStore, ConnectionMode, ValidationError,
    };
    pub use crate::lifecycle::{HealthStatus, LinkDefinition, LinkManager};
    pub use crate::provider::KeyValueProvider;
    pub use crate::store::{
        KeyListing, KeyValueStore, OperationContext, StoreAdapter, StoreError, StoreResult,
    };

    #[cfg(feature = "storage-documentdb")]
    pub use crate::backend::DocumentDbConnector;
}

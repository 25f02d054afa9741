//! Backend abstraction
//!
//! The store adapter talks to the document database only through the
//! [`BackendClient`] and [`BackendConnector`] traits.
//!
//! ```text
//! ┌─────────────────────┐
//! │    StoreAdapter     │
//! └──────────┬──────────┘
//!            │ lease
//! ┌──────────▼──────────┐
//! │  ConnectionManager  │
//! └──────────┬──────────┘
//!            │ connect
//!     ┌──────┴──────┐
//!     │             │
//! ┌───▼────┐  ┌─────▼─────┐
//! │ Memory │  │ DocumentDB│
//! └────────┘  └───────────┘
//! ```

mod connection;
mod memory;
mod traits;

pub use connection::{ConnectionManager, Lease};
pub use memory::{MemoryBackend, MemoryConnector};
pub use traits::*;

#[cfg(feature = "storage-documentdb")]
mod documentdb;

#[cfg(feature = "storage-documentdb")]
pub use documentdb::{DocumentDbClient, DocumentDbConnector};

//! Key-value store operations
//!
//! [`StoreAdapter`] turns each [`KeyValueStore`] call into backend queries
//! under a snapshot of the active configuration and maps every failure
//! into [`StoreError`].

mod adapter;
mod context;
mod error;

pub use adapter::{KeyListing, KeyValueStore, StoreAdapter};
pub use context::{Interrupted, OperationContext};
pub use error::{StoreError, StoreResult};

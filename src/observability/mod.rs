//! Observability for the provider.
//!
//! Library code emits `tracing` events under `keyvalue_documentdb::*`
//! targets; the host (or the bundled binary) installs a subscriber with
//! [`init_logging`].
//!
//! # Example
//!
//! ```no_run
//! use keyvalue_documentdb::observability::{init_logging, LogFormat};
//!
//! init_logging(LogFormat::Human, "info,keyvalue_documentdb=debug");
//! ```

pub mod logging;

pub use logging::{env_filter, init_logging, LogFormat};

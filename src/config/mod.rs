//! Configuration for the key-value provider.
//!
//! - [`link`] validates link configuration into a [`BackendConfig`]
//! - [`store`] holds the active configuration and swaps it atomically
//! - [`settings`] loads process settings from TOML
//! - [`environment`] seeds link configuration from the environment

pub mod environment;
pub mod link;
pub mod settings;
pub mod store;

pub use self::environment::EnvironmentLoader;
pub use self::link::{validate, BackendConfig, ValidationError, DEFAULT_NAMESPACE};
pub use self::settings::{
    BackendSettings, ConnectionMode, LoggingSettings, ProviderSettings, SettingsLoader,
};
pub use self::store::ConfigurationStore;

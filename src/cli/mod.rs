//! Command-line front-end
//!
//! Runs a single key-value operation through the same path the transport
//! would use: link configuration goes through [`LinkManager`], operations
//! through [`KeyValueStore`].
//!
//! [`LinkManager`]: crate::lifecycle::LinkManager

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use crate::backend::MemoryConnector;
use crate::config::{EnvironmentLoader, SettingsLoader};
use crate::observability::{init_logging, LogFormat};
use crate::provider::KeyValueProvider;
use crate::store::{KeyValueStore, OperationContext};

/// Key-value operations against a MongoDB/DocumentDB backend
#[derive(Debug, Parser)]
#[command(name = "kv-documentdb", version, about)]
pub struct Cli {
    /// Settings file (TOML)
    #[arg(long, global = true, env = "KV_DOCUMENTDB_CONFIG")]
    pub config: Option<PathBuf>,

    /// .env file to load before reading the environment
    #[arg(long, global = true)]
    pub env_file: Option<PathBuf>,

    /// Connection string (overrides KV_DOCUMENTDB_URI)
    #[arg(long, global = true)]
    pub uri: Option<String>,

    /// Database name (overrides KV_DOCUMENTDB_DATABASE)
    #[arg(long, global = true)]
    pub database: Option<String>,

    /// Key-value namespace (overrides KV_DOCUMENTDB_KV)
    #[arg(long, global = true)]
    pub kv: Option<String>,

    /// Name reported for the link configuration
    #[arg(long, global = true)]
    pub link_name: Option<String>,

    /// Use the in-process backend instead of MongoDB
    #[arg(long, global = true)]
    pub memory: bool,

    /// Emit JSON logs
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Operation to run
    #[command(subcommand)]
    pub command: Command,
}

/// Store operations
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the value stored under a key
    Get {
        /// Bucket (collection) to read
        bucket: String,
        /// Key to look up
        key: String,
    },
    /// Store a value under a key
    Set {
        /// Bucket (collection) to write
        bucket: String,
        /// Key to write
        key: String,
        /// Value, stored as its UTF-8 bytes
        value: String,
    },
    /// Remove a key
    Delete {
        /// Bucket (collection) to delete from
        bucket: String,
        /// Key to remove
        key: String,
    },
    /// Print whether a key exists
    Exists {
        /// Bucket (collection) to check
        bucket: String,
        /// Key to check
        key: String,
    },
    /// Print every key in a bucket as JSON
    ListKeys {
        /// Bucket (collection) to list
        bucket: String,
    },
    /// Check that the backend answers
    Health,
}

impl Cli {
    /// Raw link configuration: environment first, flags on top
    fn link_config(&self, env: &EnvironmentLoader) -> HashMap<String, String> {
        let mut raw = env.link_config();
        for (key, value) in [("uri", &self.uri), ("database", &self.database), ("kv", &self.kv)] {
            if let Some(value) = value {
                raw.insert(key.to_string(), value.clone());
            }
        }
        raw
    }
}

/// Execute the parsed command
pub async fn run(cli: Cli) -> Result<()> {
    let env = EnvironmentLoader::new(cli.env_file.as_deref());
    let settings_path = cli.config.clone().or_else(|| env.settings_path());
    let settings = SettingsLoader::new(settings_path.as_deref())?.settings;

    let format = if cli.json_logs {
        LogFormat::Json
    } else {
        LogFormat::from(&settings.logging)
    };
    init_logging(format, &settings.logging.level);

    let provider = if cli.memory {
        KeyValueProvider::new(Arc::new(MemoryConnector::new()), &settings.backend)
    } else {
        documentdb_provider(&settings.backend)?
    };

    let link_name = cli.link_name.clone().unwrap_or_else(|| env.link_name());
    provider
        .links()
        .on_configuration_put(&link_name, &cli.link_config(&env))
        .context("Invalid link configuration")?;

    let ctx = OperationContext::new();
    let store = provider.store();
    let mut out = std::io::stdout();

    match cli.command {
        Command::Get { bucket, key } => {
            let value = store.get(&ctx, &bucket, &key).await?;
            out.write_all(&value)?;
            writeln!(out)?;
        }
        Command::Set { bucket, key, value } => {
            store.set(&ctx, &bucket, &key, value.into_bytes()).await?;
        }
        Command::Delete { bucket, key } => {
            store.delete(&ctx, &bucket, &key).await?;
        }
        Command::Exists { bucket, key } => {
            writeln!(out, "{}", store.exists(&ctx, &bucket, &key).await?)?;
        }
        Command::ListKeys { bucket } => {
            let listing = store.list_keys(&ctx, &bucket, None).await?;
            writeln!(out, "{}", serde_json::to_string_pretty(&listing)?)?;
        }
        Command::Health => {
            let status = provider.links().health_check(&ctx).await;
            writeln!(out, "{}", serde_json::to_string_pretty(&status)?)?;
            if !status.is_healthy() {
                bail!("{}", status);
            }
        }
    }

    provider.links().shutdown();
    Ok(())
}

#[cfg(feature = "storage-documentdb")]
fn documentdb_provider(settings: &crate::config::BackendSettings) -> Result<KeyValueProvider> {
    Ok(KeyValueProvider::documentdb(settings))
}

#[cfg(not(feature = "storage-documentdb"))]
fn documentdb_provider(_settings: &crate::config::BackendSettings) -> Result<KeyValueProvider> {
    bail!("built without the storage-documentdb feature; use --memory")
}

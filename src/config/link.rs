//! Link configuration validation.
//!
//! A link event carries an untyped string map. [`validate`] turns it into a
//! [`BackendConfig`] or explains what is missing.

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

/// Namespace used when the link does not supply a `kv` value.
pub const DEFAULT_NAMESPACE: &str = "kv";

/// Raw link key holding the connection string.
pub const URI_KEY: &str = "uri";
/// Raw link key holding the database name.
pub const DATABASE_KEY: &str = "database";
/// Raw link key holding the key-value namespace.
pub const NAMESPACE_KEY: &str = "kv";

/// Errors produced while validating link configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The configuration source had no name
    #[error("missing name: link configuration must identify its source")]
    MissingName,

    /// No connection string was supplied
    #[error("missing uri: URI configuration is required, supply it through a secret (preferred) or the link configuration")]
    MissingUri,

    /// No database name was supplied
    #[error("missing database: database configuration is required")]
    MissingDatabase,
}

/// Connection parameters for the active backend.
///
/// Built only by [`validate`]; replaced as a whole on reconfiguration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    name: String,
    uri: String,
    database: String,
    namespace: String,
}

impl BackendConfig {
    /// Name of the link that supplied this configuration
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Connection string. May carry credentials; log [`Self::redacted_uri`] instead.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Database holding one collection per bucket
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Key-value namespace stored alongside each record
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Connection string with any `user:password@` userinfo masked.
    pub fn redacted_uri(&self) -> String {
        let Some(scheme_end) = self.uri.find("://") else {
            return self.uri.clone();
        };
        let rest = &self.uri[scheme_end + 3..];
        let authority_end = rest.find(['/', '?']).unwrap_or(rest.len());
        match rest[..authority_end].rfind('@') {
            Some(at) => format!("{}***@{}", &self.uri[..scheme_end + 3], &rest[at + 1..]),
            None => self.uri.clone(),
        }
    }
}

impl fmt::Display for BackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}/{}, namespace {})",
            self.name,
            self.redacted_uri(),
            self.database,
            self.namespace
        )
    }
}

fn non_empty<'a>(raw: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    raw.get(key).map(String::as_str).filter(|v| !v.is_empty())
}

/// Validate a raw link configuration map.
///
/// Checks run in order: source name, `uri`, `database`. A missing `kv`
/// falls back to [`DEFAULT_NAMESPACE`].
pub fn validate(
    raw: &HashMap<String, String>,
    source_name: &str,
) -> Result<BackendConfig, ValidationError> {
    tracing::info!(target: "keyvalue_documentdb::config", "Handling backend configuration");

    if source_name.is_empty() {
        return Err(ValidationError::MissingName);
    }

    let uri = non_empty(raw, URI_KEY).ok_or(ValidationError::MissingUri)?;
    tracing::info!(
        target: "keyvalue_documentdb::config",
        link = source_name,
        "Using URI configuration from link (consider using a secret for sensitive values)"
    );

    let database = non_empty(raw, DATABASE_KEY).ok_or(ValidationError::MissingDatabase)?;

    let namespace = match non_empty(raw, NAMESPACE_KEY) {
        Some(kv) => {
            tracing::info!(target: "keyvalue_documentdb::config", link = source_name, namespace = kv, "Using custom key-value namespace");
            kv
        }
        None => {
            tracing::debug!(target: "keyvalue_documentdb::config", "No key-value namespace supplied, using default: {}", DEFAULT_NAMESPACE);
            DEFAULT_NAMESPACE
        }
    };

    Ok(BackendConfig {
        name: source_name.to_string(),
        uri: uri.to_string(),
        database: database.to_string(),
        namespace: namespace.to_string(),
    })
}

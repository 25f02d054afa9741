//! Environment variable loading.
//!
//! The provider can be seeded with a link configuration from the process
//! environment before any link event arrives.

use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

use super::link::{DATABASE_KEY, NAMESPACE_KEY, URI_KEY};

/// Environment variable holding the connection string
pub const URI_VAR: &str = "KV_DOCUMENTDB_URI";
/// Environment variable holding the database name
pub const DATABASE_VAR: &str = "KV_DOCUMENTDB_DATABASE";
/// Environment variable holding the key-value namespace
pub const NAMESPACE_VAR: &str = "KV_DOCUMENTDB_KV";
/// Environment variable naming the seeded link
pub const LINK_NAME_VAR: &str = "KV_DOCUMENTDB_LINK_NAME";
/// Environment variable pointing at the settings file
pub const SETTINGS_VAR: &str = "KV_DOCUMENTDB_CONFIG";

/// Loads environment variables from a .env file and the system environment.
#[derive(Debug, Clone, Default)]
pub struct EnvironmentLoader {
    env_file: Option<PathBuf>,
}

impl EnvironmentLoader {
    /// Initialize the environment loader.
    ///
    /// A .env file is only read when a path is given explicitly.
    pub fn new(env_file: Option<&Path>) -> Self {
        if let Some(path) = env_file {
            if path.exists() {
                if let Err(e) = dotenv::from_path(path) {
                    tracing::warn!(target: "keyvalue_documentdb::config", "Failed to load .env file {}: {}", path.display(), e);
                }
            }
        }

        Self {
            env_file: env_file.map(Path::to_path_buf),
        }
    }

    /// The .env file this loader was created with
    pub fn env_file(&self) -> Option<&Path> {
        self.env_file.as_deref()
    }

    /// Raw link configuration assembled from the environment.
    ///
    /// Unset variables are left out so validation reports them.
    pub fn link_config(&self) -> HashMap<String, String> {
        [(URI_KEY, URI_VAR), (DATABASE_KEY, DATABASE_VAR), (NAMESPACE_KEY, NAMESPACE_VAR)]
            .into_iter()
            .filter_map(|(key, var)| env::var(var).ok().map(|value| (key.to_string(), value)))
            .collect()
    }

    /// Name used for the seeded link
    pub fn link_name(&self) -> String {
        env::var(LINK_NAME_VAR).unwrap_or_else(|_| "default".to_string())
    }

    /// Settings file override
    pub fn settings_path(&self) -> Option<PathBuf> {
        env::var(SETTINGS_VAR).ok().map(PathBuf::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    // Single test so env mutations do not race with each other
    #[test]
    fn test_link_config_from_env_file() {
        for var in [URI_VAR, DATABASE_VAR, NAMESPACE_VAR, LINK_NAME_VAR] {
            env::remove_var(var);
        }

        let loader = EnvironmentLoader::new(None);
        assert!(loader.env_file().is_none());
        assert!(loader.link_config().is_empty());
        assert_eq!(loader.link_name(), "default");

        let dir = tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(
            &path,
            format!("{}=mongodb://localhost:27017\n{}=app\n{}=link-a\n", URI_VAR, DATABASE_VAR, LINK_NAME_VAR),
        )
        .unwrap();

        let loader = EnvironmentLoader::new(Some(&path));
        let raw = loader.link_config();
        assert_eq!(raw.get("uri").map(String::as_str), Some("mongodb://localhost:27017"));
        assert_eq!(raw.get("database").map(String::as_str), Some("app"));
        assert!(!raw.contains_key("kv"));
        assert_eq!(loader.link_name(), "link-a");

        for var in [URI_VAR, DATABASE_VAR, NAMESPACE_VAR, LINK_NAME_VAR] {
            env::remove_var(var);
        }
    }
}

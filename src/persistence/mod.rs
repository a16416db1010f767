//! # Persistence Module
//!
//! Data model and TOML storage of the console configuration.
//!
//! ## Key Abstractions
//! - **Settings**: page size, batch policies and the dead-letter filter
//! - **Connections**: the registered connection names in registration order.
//!   Credentials are never written here; they are resolved through a
//!   [`CredentialStore`](crate::connection::credential_store::CredentialStore)
//!   when connections are restored.
//!
//! A missing configuration file degrades to defaults with a warning. A file
//! that exists but cannot be parsed is reported as `ConsoleError::Config`
//! so a broken file is never silently overwritten.

pub mod config_portal;

use crate::error::{ConsoleError, ConsoleResult};
use crate::operations::BatchPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const CONFIG_DIR: &str = ".config/sbconsole";
const CONFIG_FILE: &str = "config.toml";

/// Behavioural settings of the console
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct ConsoleSettings {
    /// Messages fetched per peek
    pub peek_page_size: u32,
    pub resend_policy: BatchPolicy,
    pub remove_policy: BatchPolicy,
    /// Leave entities without dead letters out of the overview
    pub only_nonzero_dead_letters: bool,
}

impl Default for ConsoleSettings {
    fn default() -> Self {
        Self {
            peek_page_size: 100,
            resend_policy: BatchPolicy::AbortOnError,
            remove_policy: BatchPolicy::ContinueOnError,
            only_nonzero_dead_letters: true,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(default)]
pub struct ConnectionsConfig {
    pub names: Vec<String>,
}

impl ConnectionsConfig {
    /// Appends `name` unless it is already listed
    pub fn insert(&mut self, name: &str) -> bool {
        if self.names.iter().any(|n| n == name) {
            return false;
        }
        self.names.push(name.to_string());
        true
    }

    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.names.len();
        self.names.retain(|n| n != name);
        before != self.names.len()
    }
}

/// Complete on-disk configuration
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(default)]
pub struct ConsoleConfig {
    pub settings: ConsoleSettings,
    pub connections: ConnectionsConfig,
}

impl ConsoleConfig {
    /// `~/.config/sbconsole/config.toml`
    pub fn default_path() -> PathBuf {
        let mut path = get_home_dir();
        path.push(CONFIG_DIR);
        path.push(CONFIG_FILE);
        path
    }

    pub async fn load(path: &Path) -> ConsoleResult<Self> {
        let exists = tokio::fs::try_exists(path)
            .await
            .map_err(|e| ConsoleError::Config(format!("Failed to check {}: {}", path.display(), e)))?;
        if !exists {
            warn!(
                "Configuration {} does not exist, using defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ConsoleError::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        let config = Self::parse(&content)?;
        debug!(
            "Loaded configuration with {} connections from {}",
            config.connections.names.len(),
            path.display()
        );
        Ok(config)
    }

    pub fn parse(content: &str) -> ConsoleResult<Self> {
        toml::from_str(content)
            .map_err(|e| ConsoleError::Config(format!("Failed to parse configuration: {}", e)))
    }

    pub async fn save(&self, path: &Path) -> ConsoleResult<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                ConsoleError::Config(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConsoleError::Config(format!("Failed to serialize configuration: {}", e)))?;
        tokio::fs::write(path, content)
            .await
            .map_err(|e| ConsoleError::Config(format!("Failed to write {}: {}", path.display(), e)))?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

fn get_home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| {
        warn!("Could not determine home directory, using current directory");
        PathBuf::from(".")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConsoleConfig::load(&dir.path().join("config.toml"))
            .await
            .unwrap();
        assert_eq!(config, ConsoleConfig::default());
        assert_eq!(config.settings.peek_page_size, 100);
        assert_eq!(config.settings.remove_policy, BatchPolicy::ContinueOnError);
    }

    #[tokio::test]
    async fn save_then_load_keeps_connection_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = ConsoleConfig::default();
        config.connections.insert("prod");
        config.connections.insert("dev");
        config.settings.resend_policy = BatchPolicy::ContinueOnError;

        config.save(&path).await.unwrap();
        let loaded = ConsoleConfig::load(&path).await.unwrap();

        assert_eq!(loaded.connections.names, ["prod", "dev"]);
        assert_eq!(loaded.settings.resend_policy, BatchPolicy::ContinueOnError);
    }

    #[test]
    fn partial_files_fill_in_defaults() {
        let config = ConsoleConfig::parse(
            "[settings]\npeek_page_size = 25\nremove_policy = \"abort_on_error\"\n",
        )
        .unwrap();
        assert_eq!(config.settings.peek_page_size, 25);
        assert_eq!(config.settings.remove_policy, BatchPolicy::AbortOnError);
        assert!(config.settings.only_nonzero_dead_letters);
        assert!(config.connections.names.is_empty());
    }

    #[tokio::test]
    async fn malformed_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        tokio::fs::write(&path, "settings = [").await.unwrap();
        assert!(matches!(
            ConsoleConfig::load(&path).await,
            Err(ConsoleError::Config(_))
        ));
    }

    #[test]
    fn connection_names_stay_unique() {
        let mut connections = ConnectionsConfig::default();
        assert!(connections.insert("prod"));
        assert!(!connections.insert("prod"));
        assert!(connections.remove("prod"));
        assert!(!connections.remove("prod"));
    }
}

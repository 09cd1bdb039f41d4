//! Configuration Management
//!
//! Persisted fallback settings for the provider, read from
//! `<config dir>/duplocloud/config.json`. Values set in the provider block or
//! the environment take precedence.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// User configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub duplo_host: Option<String>,
    #[serde(default)]
    pub duplo_token: Option<String>,
    #[serde(default)]
    pub user_account: Option<String>,
}

/// `<config dir>/duplocloud`
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("duplocloud"))
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        config_dir().map(|p| p.join("config.json"))
    }

    /// Load configuration from disk; a missing file is an empty configuration
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_from_file() {
        let dir = std::env::temp_dir().join(format!("duplo-config-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.json");
        std::fs::write(&path, r#"{"duplo_host": "https://acme.duplocloud.net"}"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.duplo_host.as_deref(), Some("https://acme.duplocloud.net"));
        assert!(config.duplo_token.is_none());

        std::fs::write(&path, "not json").unwrap();
        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().starts_with("failed to parse"));
        std::fs::remove_dir_all(&dir).unwrap();
    }
}

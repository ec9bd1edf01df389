//! Daemon-level configuration: the index registry and the transport's
//! host/auth/CORS knobs, kept separate from the per-index project config
//! (`core::config::ProjectConfig`) the same way the original daemon split
//! server config from project config.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexRegistration {
    pub name: String,
    pub config_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub auth: Option<String>,
    #[serde(default = "default_cors_origins")]
    pub cors_allowed_origins: Vec<String>,
    #[serde(default)]
    pub default_index: Option<String>,
    #[serde(default)]
    pub indexes: Vec<IndexRegistration>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8420
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            auth: None,
            cors_allowed_origins: default_cors_origins(),
            default_index: None,
            indexes: Vec::new(),
        }
    }
}

impl DaemonConfig {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading daemon config at {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&content)
            .with_context(|| format!("parsing daemon config at {}", path.display()))?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_yaml::to_string(self)?)?;
        Ok(())
    }

    pub fn index_paths(&self) -> HashMap<String, PathBuf> {
        self.indexes
            .iter()
            .map(|r| (r.name.clone(), r.config_path.clone()))
            .collect()
    }

    pub fn requires_auth(&self) -> bool {
        self.auth.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_bind_to_loopback() {
        let config = DaemonConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8420);
        assert!(!config.requires_auth());
    }

    #[test]
    fn missing_file_yields_default() {
        let config = DaemonConfig::load(Path::new("/nonexistent/daemon.yaml")).unwrap();
        assert_eq!(config.port, 8420);
    }
}

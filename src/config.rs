use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// Local dfx replica, where the explainer backend runs during development.
pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:4943";

const DEFAULT_TIMEOUT_SECS: u64 = 120;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    pub backend_url: Option<String>,
    pub request_timeout_secs: Option<u64>,
}

impl Config {
    pub fn new() -> Self {
        Self {
            backend_url: None,
            request_timeout_secs: None,
        }
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Scaffold the config file on first run so users have something to
    /// edit; an existing file is never touched.
    pub fn save_if_missing(&self) -> Result<()> {
        let path = Self::config_path()?;
        if path.exists() {
            return Ok(());
        }
        self.save_to(&path)
    }

    fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Effective backend URL: `EXPLAINER_BACKEND_URL` wins, then the
    /// config file, then the local replica default.
    pub fn backend_url(&self) -> String {
        std::env::var("EXPLAINER_BACKEND_URL")
            .ok()
            .or_else(|| self.backend_url.clone())
            .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    fn config_path() -> Result<PathBuf> {
        Ok(Self::app_dir()?.join("config.json"))
    }

    pub fn log_path() -> Result<PathBuf> {
        Ok(Self::app_dir()?.join("explainer.log"))
    }

    fn app_dir() -> Result<PathBuf> {
        let config_dir =
            dirs::config_dir().ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("contract-explainer"))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert!(config.backend_url.is_none());
        assert_eq!(config.request_timeout(), Duration::from_secs(120));
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = Config {
            backend_url: Some("http://backend.example:8080".to_string()),
            request_timeout_secs: Some(30),
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(
            loaded.backend_url.as_deref(),
            Some("http://backend.example:8080")
        );
        assert_eq!(loaded.request_timeout(), Duration::from_secs(30));
    }
}

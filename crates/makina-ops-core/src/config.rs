//! Application configuration management.
//!
//! This module handles loading and saving the console configuration: the
//! API base URL, request/refresh timeouts, where the session is persisted,
//! and the last email used to log in.
//!
//! Configuration is stored at `~/.config/makina-ops/config.json`. A few
//! values can be overridden from the environment (see `apply_env`).

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::auth::{FileStorage, KeyringStorage, MemoryStorage, SessionStorage, STORAGE_KEY};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "makina-ops";

/// Config file name
const CONFIG_FILE: &str = "config.json";

pub const DEFAULT_API_URL: &str = "http://localhost:4000/api";

/// Environment variable overriding `api_url`
pub const ENV_API_URL: &str = "MAKINA_API_URL";

/// Environment variable overriding `last_email`
pub const ENV_EMAIL: &str = "MAKINA_EMAIL";

/// Where the session snapshot is persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    File,
    Keyring,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_url: String,
    pub request_timeout_secs: u64,
    pub refresh_timeout_secs: u64,
    pub storage: StorageBackend,
    pub last_email: Option<String>,
    /// Directory for daily log files; stderr only when unset
    pub log_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            request_timeout_secs: 30,
            refresh_timeout_secs: 15,
            storage: StorageBackend::File,
            last_email: None,
            log_dir: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
            self.api_url = url;
        }
        if let Some(email) = lookup(ENV_EMAIL).filter(|v| !v.trim().is_empty()) {
            self.last_email = Some(email);
        }
    }

    /// Storage backend for the session snapshot
    pub fn session_storage(&self) -> Result<Box<dyn SessionStorage>> {
        Ok(match self.storage {
            StorageBackend::File => Box::new(FileStorage::new(
                self.cache_dir()?.join(format!("{}.json", STORAGE_KEY)),
            )),
            StorageBackend::Keyring => Box::new(KeyringStorage::new(STORAGE_KEY)),
            StorageBackend::Memory => Box::new(MemoryStorage::new()),
        })
    }
}

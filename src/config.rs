use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::DEFAULT_STORAGE_KEY;

/// Environment variables that override the config file
pub const ENV_SUPABASE_URL: &str = "LUMEN_SUPABASE_URL";
pub const ENV_SUPABASE_KEY: &str = "LUMEN_SUPABASE_KEY";
pub const ENV_DATA_DIR: &str = "LUMEN_DATA_DIR";
pub const ENV_STORAGE_KEY: &str = "LUMEN_STORAGE_KEY";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Data directory not found")]
    DataDirNotFound,
}

/// Settings read from `config.toml` and the environment
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LumenConfig {
    /// Project URL of the hosted backend (e.g. "https://xyz.supabase.co")
    pub supabase_url: Option<String>,
    /// Publishable (anon) API key of the project
    pub supabase_key: Option<String>,
    /// Where the cache and session live; defaults to the platform data dir
    pub data_dir: Option<PathBuf>,
    /// Name of the cache record
    pub storage_key: String,
}

impl Default for LumenConfig {
    fn default() -> Self {
        Self {
            supabase_url: None,
            supabase_key: None,
            data_dir: None,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
        }
    }
}

/// Connection details of the hosted backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    pub url: String,
    pub api_key: String,
}

impl LumenConfig {
    /// Platform location of the config file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("lumen").join("config.toml"))
    }

    /// Load the config file (an explicit path must exist, the default one
    /// may be absent) and apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::read(path)?,
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::read(&path)?,
                _ => Self::default(),
            },
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn read(path: &Path) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("Config: loaded {}", path.display());
        Self::from_toml(&data)
    }

    pub fn from_toml(data: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(data)?)
    }

    /// Overlay values from `lookup` (the process environment in practice)
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty(ENV_SUPABASE_URL) {
            self.supabase_url = Some(url);
        }
        if let Some(key) = non_empty(ENV_SUPABASE_KEY) {
            self.supabase_key = Some(key);
        }
        if let Some(dir) = non_empty(ENV_DATA_DIR) {
            self.data_dir = Some(PathBuf::from(dir));
        }
        if let Some(key) = non_empty(ENV_STORAGE_KEY) {
            self.storage_key = key;
        }
    }

    /// Backend connection, if both URL and key are set. Without one the
    /// app runs local-only.
    pub fn backend(&self) -> Option<BackendConfig> {
        let url = self.supabase_url.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        let api_key = self.supabase_key.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        Some(BackendConfig {
            url: url.to_string(),
            api_key: api_key.to_string(),
        })
    }

    pub fn data_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => dirs::data_local_dir()
                .map(|p| p.join("lumen"))
                .ok_or(ConfigError::DataDirNotFound),
        }
    }
}

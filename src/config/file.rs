//! Configuration file handling

use super::ServiceConfig;
use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration file structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Proxy for all upstream requests (http/https/socks5)
    #[serde(default)]
    pub proxy: Option<String>,

    /// Global settings
    #[serde(default)]
    pub settings: Settings,

    /// Cache settings
    #[serde(default)]
    pub cache: CacheFileConfig,

    /// Upstream services
    #[serde(default)]
    pub services: Vec<ServiceConfig>,
}

/// Global settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Default request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Attempts per endpoint before moving on
    #[serde(default = "default_retries")]
    pub retry_attempts: u32,

    /// Base delay between attempts on the same endpoint
    #[serde(default = "default_backoff_base")]
    pub backoff_base_ms: u64,

    /// Items in flight per batch chunk
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Pause between batch chunks
    #[serde(default = "default_inter_batch_delay")]
    pub inter_batch_delay_ms: u64,

    /// Largest key list accepted by one batch call
    #[serde(default = "default_max_batch_keys")]
    pub max_batch_keys: usize,
}

fn default_timeout() -> u64 {
    10
}

fn default_retries() -> u32 {
    2
}

fn default_backoff_base() -> u64 {
    250
}

fn default_batch_size() -> usize {
    10
}

fn default_inter_batch_delay() -> u64 {
    50
}

fn default_max_batch_keys() -> usize {
    100
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout(),
            retry_attempts: default_retries(),
            backoff_base_ms: default_backoff_base(),
            batch_size: default_batch_size(),
            inter_batch_delay_ms: default_inter_batch_delay(),
            max_batch_keys: default_max_batch_keys(),
        }
    }
}

/// Cache configuration from file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheFileConfig {
    /// Persist client-side cache entries to disk
    #[serde(default = "default_persist")]
    pub persist: bool,

    /// Cache file location (defaults to the user cache directory)
    #[serde(default)]
    pub path: Option<PathBuf>,
}

fn default_persist() -> bool {
    true
}

impl Default for CacheFileConfig {
    fn default() -> Self {
        Self {
            persist: default_persist(),
            path: None,
        }
    }
}

impl CacheFileConfig {
    /// Resolved cache file path
    pub fn resolved_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(Self::default_path)
    }

    /// Default cache file path
    pub fn default_path() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("explorer-relay")
            .join("cache.json")
    }
}

impl ConfigFile {
    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("explorer-relay")
            .join("config.toml")
    }

    /// Load from default path
    pub fn load_default() -> Result<Option<Self>> {
        let path = Self::default_path();
        if path.exists() {
            Ok(Some(Self::load(&path)?))
        } else {
            Ok(None)
        }
    }

    /// Load from a specific path
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::InvalidFile(format!("{}: {}", path.display(), e)))?;

        let config: Self = toml::from_str(&content).map_err(ConfigError::from)?;
        Ok(config)
    }

    /// Save to a specific path
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ConfigError::InvalidFile(format!("Failed to create directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::InvalidFile(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| ConfigError::InvalidFile(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    /// Save to default path
    pub fn save_default(&self) -> Result<()> {
        self.save(&Self::default_path())
    }

    /// Find an enabled service by name
    pub fn service(&self, name: &str) -> Option<&ServiceConfig> {
        self.services.iter().find(|s| s.enabled && s.name == name)
    }

    /// Starter config written by `config init`
    pub fn example() -> Self {
        Self {
            services: vec![
                ServiceConfig::new(
                    "lcd",
                    vec![
                        "https://lcd-1.example.org".to_string(),
                        "https://lcd-2.example.org".to_string(),
                    ],
                )
                .with_note("Chain LCD mirrors"),
                ServiceConfig::cluster(
                    "backend",
                    vec![
                        "https://backend-a.example.org".to_string(),
                        "https://backend-b.example.org".to_string(),
                    ],
                )
                .with_note("Aggregation backend clusters"),
            ],
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PoolKind;

    #[test]
    fn test_parse_config() {
        let toml = r#"
proxy = "socks5://127.0.0.1:9050"

[settings]
timeout_seconds = 20
batch_size = 15

[cache]
persist = false

[[services]]
name = "osmosis-lcd"
urls = ["https://lcd.osmosis.example", "https://lcd2.osmosis.example"]
failure_threshold = 4

[[services]]
name = "backend"
kind = "cluster"
urls = ["https://a.example", "https://b.example"]
enabled = false
"#;

        let config: ConfigFile = toml::from_str(toml).unwrap();
        assert_eq!(config.settings.timeout_seconds, 20);
        assert_eq!(config.settings.batch_size, 15);
        assert_eq!(config.settings.inter_batch_delay_ms, 50);
        assert_eq!(config.settings.max_batch_keys, 100);
        assert!(!config.cache.persist);
        assert_eq!(config.services.len(), 2);
        assert_eq!(config.services[0].kind, PoolKind::Mirrors);
        assert_eq!(config.services[0].failure_threshold, 4);
        assert_eq!(config.services[1].kind, PoolKind::Cluster);
        assert!(config.service("osmosis-lcd").is_some());
        assert!(config.service("backend").is_none());
        assert_eq!(config.proxy.as_deref(), Some("socks5://127.0.0.1:9050"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = ConfigFile::example();
        config.save(&path).unwrap();

        let loaded = ConfigFile::load(&path).unwrap();
        assert_eq!(loaded.services.len(), 2);
        assert_eq!(loaded.services[1].name, "backend");
        assert_eq!(loaded.settings.retry_attempts, 2);
    }

    #[test]
    fn test_default_path() {
        let path = ConfigFile::default_path();
        assert!(path.to_string_lossy().contains("explorer-relay"));
        assert!(CacheFileConfig::default_path()
            .to_string_lossy()
            .ends_with("cache.json"));
    }
}

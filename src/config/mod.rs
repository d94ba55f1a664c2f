//! Runtime configuration

mod endpoint;
mod file;

pub use endpoint::{PoolKind, ServiceConfig};
pub use file::{CacheFileConfig, ConfigFile, Settings};

use crate::batch::BatchConfig;
use crate::error::{ConfigError, Result};
use std::time::Duration;

/// Complete runtime configuration for a [`Relay`](crate::Relay)
#[derive(Debug, Clone, Default)]
pub struct RelayConfig {
    /// Upstream services, one endpoint pool each
    pub services: Vec<ServiceConfig>,
    /// Timeouts, retries and batching
    pub settings: Settings,
    /// Client-side cache persistence
    pub cache: CacheFileConfig,
    /// Global proxy URL
    pub proxy: Option<String>,
}

impl RelayConfig {
    /// Start building a config
    pub fn builder() -> RelayConfigBuilder {
        RelayConfigBuilder::default()
    }

    /// Build from a parsed config file, keeping only enabled services
    pub fn from_file(file: ConfigFile) -> Self {
        Self {
            services: file.services.into_iter().filter(|s| s.enabled).collect(),
            settings: file.settings,
            cache: file.cache,
            proxy: file.proxy,
        }
    }

    /// Default per-request timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.settings.timeout_seconds)
    }

    /// Base delay between attempts on one endpoint
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.settings.backoff_base_ms)
    }

    /// Batch orchestration settings
    pub fn batch_config(&self) -> BatchConfig {
        BatchConfig {
            batch_size: self.settings.batch_size,
            inter_batch_delay: Duration::from_millis(self.settings.inter_batch_delay_ms),
            max_keys: self.settings.max_batch_keys,
        }
    }

    /// Look up a service by name
    pub fn service(&self, name: &str) -> Option<&ServiceConfig> {
        self.services.iter().find(|s| s.name == name)
    }
}

/// Builder for [`RelayConfig`]
#[derive(Debug, Default)]
pub struct RelayConfigBuilder {
    config: RelayConfig,
}

impl RelayConfigBuilder {
    /// Add an upstream service
    pub fn service(mut self, service: ServiceConfig) -> Self {
        self.config.services.retain(|s| s.name != service.name);
        self.config.services.push(service);
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.settings.timeout_seconds = secs;
        self
    }

    pub fn retry_attempts(mut self, attempts: u32) -> Self {
        self.config.settings.retry_attempts = attempts;
        self
    }

    pub fn backoff_base_ms(mut self, ms: u64) -> Self {
        self.config.settings.backoff_base_ms = ms;
        self
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.settings.batch_size = size;
        self
    }

    pub fn inter_batch_delay_ms(mut self, ms: u64) -> Self {
        self.config.settings.inter_batch_delay_ms = ms;
        self
    }

    pub fn max_batch_keys(mut self, max: usize) -> Self {
        self.config.settings.max_batch_keys = max;
        self
    }

    pub fn cache(mut self, cache: CacheFileConfig) -> Self {
        self.config.cache = cache;
        self
    }

    pub fn proxy(mut self, proxy: impl Into<String>) -> Self {
        self.config.proxy = Some(proxy.into());
        self
    }

    /// Validate and build
    pub fn build(self) -> Result<RelayConfig> {
        for service in &self.config.services {
            if service.normalized_urls().is_empty() {
                return Err(ConfigError::EmptyPool(service.name.clone()).into());
            }
        }
        Ok(self.config)
    }
}

//! Upstream service configuration

use crate::rpc::defaults::{DEFAULT_FAILURE_THRESHOLD, DEFAULT_LIVENESS_PATH};
use serde::{Deserialize, Serialize};

/// How the endpoints of a service relate to each other
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolKind {
    /// Independent blockchain node mirrors whose liveness varies; probed
    /// before use
    #[default]
    Mirrors,
    /// Backend clusters behind their own load balancer; never probed
    Cluster,
}

impl std::fmt::Display for PoolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PoolKind::Mirrors => write!(f, "mirrors"),
            PoolKind::Cluster => write!(f, "cluster"),
        }
    }
}

impl std::str::FromStr for PoolKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mirrors" | "lcd" | "node" => Ok(PoolKind::Mirrors),
            "cluster" | "backend" => Ok(PoolKind::Cluster),
            other => Err(format!("Unknown pool kind: {}", other)),
        }
    }
}

/// Configuration for one logical upstream service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Service name used by callers (e.g. "cosmoshub-lcd", "backend")
    pub name: String,
    /// Candidate base URLs, in preference order
    pub urls: Vec<String>,
    /// Mirrors or load-balanced cluster
    #[serde(default)]
    pub kind: PoolKind,
    /// Path used by the liveness probe
    #[serde(default = "default_liveness_path")]
    pub liveness_path: String,
    /// Consecutive failures before the pool rotates
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Optional note about the service
    #[serde(default)]
    pub note: Option<String>,
    /// Whether this service is enabled
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_liveness_path() -> String {
    DEFAULT_LIVENESS_PATH.to_string()
}

fn default_failure_threshold() -> u32 {
    DEFAULT_FAILURE_THRESHOLD
}

fn default_enabled() -> bool {
    true
}

impl ServiceConfig {
    /// Create a mirror service with defaults
    pub fn new(name: impl Into<String>, urls: Vec<String>) -> Self {
        Self {
            name: name.into(),
            urls,
            kind: PoolKind::Mirrors,
            liveness_path: default_liveness_path(),
            failure_threshold: default_failure_threshold(),
            note: None,
            enabled: true,
        }
    }

    /// A two-cluster backend service
    pub fn cluster(name: impl Into<String>, urls: Vec<String>) -> Self {
        Self::new(name, urls).with_kind(PoolKind::Cluster)
    }

    /// Builder-style setter for kind
    pub fn with_kind(mut self, kind: PoolKind) -> Self {
        self.kind = kind;
        self
    }

    /// Builder-style setter for liveness_path
    pub fn with_liveness_path(mut self, path: impl Into<String>) -> Self {
        self.liveness_path = path.into();
        self
    }

    /// Builder-style setter for failure_threshold
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Builder-style setter for note
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// URLs with surrounding whitespace and trailing slashes removed, duplicates dropped
    pub fn normalized_urls(&self) -> Vec<String> {
        let mut urls: Vec<String> = Vec::with_capacity(self.urls.len());
        for url in &self.urls {
            let url = url.trim().trim_end_matches('/').to_string();
            if !url.is_empty() && !urls.contains(&url) {
                urls.push(url);
            }
        }
        urls
    }
}

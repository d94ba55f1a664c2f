//! Cache entries and freshness windows

use crate::error::ConfigError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// How long an entry is served directly, and how long it may be served
/// stale while a refresh runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TtlPolicy {
    fresh: Duration,
    stale: Duration,
}

impl TtlPolicy {
    /// Create a policy; `fresh` must not exceed `stale`
    pub fn new(fresh: Duration, stale: Duration) -> Result<Self, ConfigError> {
        if fresh > stale {
            return Err(ConfigError::InvalidTtl {
                fresh_secs: fresh.as_secs(),
                stale_secs: stale.as_secs(),
            });
        }
        Ok(Self { fresh, stale })
    }

    pub fn from_secs(fresh: u64, stale: u64) -> Result<Self, ConfigError> {
        Self::new(Duration::from_secs(fresh), Duration::from_secs(stale))
    }

    /// Fresh window with a stale window twice as long
    pub const fn doubled(fresh_secs: u64) -> Self {
        Self {
            fresh: Duration::from_secs(fresh_secs),
            stale: Duration::from_secs(fresh_secs.saturating_mul(2)),
        }
    }

    /// Holder counts as cached by the browser side
    pub const fn holder_counts_client() -> Self {
        Self::doubled(5 * 60)
    }

    /// Holder counts as cached by the server side
    pub const fn holder_counts_server() -> Self {
        Self::doubled(10 * 60)
    }

    /// Prices and volume
    pub const fn prices() -> Self {
        Self::doubled(60 * 60)
    }

    /// Staking and chain parameters
    pub const fn network_params() -> Self {
        Self::doubled(5 * 60)
    }

    pub fn fresh(&self) -> Duration {
        self.fresh
    }

    pub fn stale(&self) -> Duration {
        self.stale
    }

    /// `Cache-Control` value for responses built from this policy.
    /// `stale-while-revalidate` counts from the end of the fresh window.
    pub fn cache_control(&self) -> String {
        format!(
            "public, s-maxage={}, stale-while-revalidate={}",
            self.fresh.as_secs(),
            self.stale.saturating_sub(self.fresh).as_secs()
        )
    }
}

/// Where an entry sits relative to its windows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Stale,
    Expired,
}

/// A cached JSON value with the policy it was stored under
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub value: Value,
    pub fetched_at: DateTime<Utc>,
    pub fresh_ttl: Duration,
    pub stale_ttl: Duration,
}

impl CacheEntry {
    /// New entry fetched now
    pub fn new(value: Value, policy: TtlPolicy) -> Self {
        Self::fetched_at(value, policy, Utc::now())
    }

    pub fn fetched_at(value: Value, policy: TtlPolicy, fetched_at: DateTime<Utc>) -> Self {
        Self {
            value,
            fetched_at,
            fresh_ttl: policy.fresh,
            stale_ttl: policy.stale,
        }
    }

    /// Age at `now`; entries from the future count as brand new
    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.fetched_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    pub fn freshness_at(&self, now: DateTime<Utc>) -> Freshness {
        let age = self.age_at(now);
        if age < self.fresh_ttl {
            Freshness::Fresh
        } else if age < self.stale_ttl {
            Freshness::Stale
        } else {
            Freshness::Expired
        }
    }

    pub fn freshness(&self) -> Freshness {
        self.freshness_at(Utc::now())
    }
}

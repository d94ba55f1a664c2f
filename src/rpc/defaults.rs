//! Default request profiles and well-known LCD paths
//!
//! Timeouts are tuned per criticality: liveness and balance lookups fail fast,
//! proxied RPC traffic gets the long budget.

use crate::error::ConfigError;
use std::str::FromStr;
use std::time::Duration;

/// Consecutive failures before a pool rotates to its next endpoint
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;

/// Cheap LCD path answered by every Cosmos SDK node
pub const DEFAULT_LIVENESS_PATH: &str = "/cosmos/base/tendermint/v1beta1/node_info";

/// Probe deadline per candidate endpoint
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Attempts on one endpoint before moving to the next
pub const DEFAULT_ATTEMPTS_PER_ENDPOINT: u32 = 2;

/// Base of the linear backoff between attempts on one endpoint
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_millis(250);

/// Placeholder substituted by batch keys in request templates
pub const KEY_PLACEHOLDER: &str = "{key}";

/// Bank balances of an account
pub const BALANCES_PATH: &str = "/cosmos/bank/v1beta1/balances/{key}";

/// A single validator by operator address
pub const VALIDATOR_PATH: &str = "/cosmos/staking/v1beta1/validators/{key}";

/// Slashing signing info of a validator consensus address (uptime)
pub const SIGNING_INFO_PATH: &str = "/cosmos/slashing/v1beta1/signing_infos/{key}";

/// Total supply of a denomination
pub const SUPPLY_PATH: &str = "/cosmos/bank/v1beta1/supply/by_denom";

/// Staking module parameters
pub const STAKING_PARAMS_PATH: &str = "/cosmos/staking/v1beta1/params";

/// CosmWasm smart query prefix; the base64 message follows `/smart/`
pub const SMART_QUERY_PATH: &str = "/cosmwasm/wasm/v1/contract";

/// Signed transaction broadcast
pub const BROADCAST_PATH: &str = "/cosmos/tx/v1beta1/txs";

/// Request profile, choosing timeout and retry shape by call criticality
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestProfile {
    /// Liveness checks
    Liveness,
    /// Balance and account lookups
    Balance,
    /// General chain state queries
    Query,
    /// Forwarded RPC / proxy traffic
    Proxy,
    /// Signed transaction forwarding
    Broadcast,
}

impl RequestProfile {
    /// Hard timeout for one attempt
    pub fn timeout(&self) -> Duration {
        match self {
            RequestProfile::Liveness => PROBE_TIMEOUT,
            RequestProfile::Balance => Duration::from_secs(5),
            RequestProfile::Query => Duration::from_secs(10),
            RequestProfile::Proxy => Duration::from_secs(30),
            RequestProfile::Broadcast => Duration::from_secs(30),
        }
    }

    /// Attempts per endpoint
    pub fn attempts_per_endpoint(&self) -> u32 {
        match self {
            RequestProfile::Liveness | RequestProfile::Broadcast => 1,
            _ => DEFAULT_ATTEMPTS_PER_ENDPOINT,
        }
    }

    /// Whether mirrors should be probed before the real request
    pub fn probes(&self) -> bool {
        !matches!(self, RequestProfile::Liveness)
    }
}

impl FromStr for RequestProfile {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "liveness" => Ok(RequestProfile::Liveness),
            "balance" => Ok(RequestProfile::Balance),
            "query" => Ok(RequestProfile::Query),
            "proxy" => Ok(RequestProfile::Proxy),
            "broadcast" => Ok(RequestProfile::Broadcast),
            other => Err(ConfigError::UnknownProfile(other.to_string())),
        }
    }
}

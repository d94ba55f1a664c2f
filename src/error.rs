//! Error types for explorer-relay

use std::fmt;
use thiserror::Error;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    /// A single logical request exhausted every endpoint and attempt
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Invalid batch input, rejected before any network activity
    #[error("Batch error: {0}")]
    Batch(#[from] BatchError),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Cache store errors
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// Output errors
    #[error("Output error: {0}")]
    Output(#[from] OutputError),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

/// Classification of a failed request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The attempt did not complete before its deadline
    Timeout,
    /// The upstream answered with a non-2xx status
    HttpError(u16),
    /// DNS, connect or transfer failure
    NetworkError,
    /// The upstream answered 401 or 403
    Unauthorized,
    /// The body was not JSON or did not match the expected shape
    Malformed,
}

impl FailureKind {
    /// Classify an HTTP status that is not a success
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => FailureKind::Unauthorized,
            s => FailureKind::HttpError(s),
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::HttpError(status) => write!(f, "HTTP {}", status),
            FailureKind::NetworkError => write!(f, "network error"),
            FailureKind::Unauthorized => write!(f, "unauthorized"),
            FailureKind::Malformed => write!(f, "malformed response"),
        }
    }
}

impl serde::Serialize for FailureKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A classified request failure, surfaced when an [`Outcome`](crate::Outcome) is
/// turned into a `Result`
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Structural problems with a batch request
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BatchError {
    #[error("Batch contains no keys")]
    EmptyKeys,

    #[error("Too many keys: max {max}, requested {requested}")]
    TooManyKeys { max: usize, requested: usize },

    #[error("Batch size must be at least 1")]
    InvalidBatchSize,

    #[error("Duplicate key in batch: {0}")]
    DuplicateKey(String),

    #[error("Invalid request template: {0}")]
    InvalidTemplate(String),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid config file: {0}")]
    InvalidFile(String),

    #[error("Service {0} has no endpoints")]
    EmptyPool(String),

    #[error("Unknown service: {0}")]
    UnknownService(String),

    #[error("Invalid endpoint URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Invalid TTL policy: fresh {fresh_secs}s exceeds stale {stale_secs}s")]
    InvalidTtl { fresh_secs: u64, stale_secs: u64 },

    #[error("Unknown request profile: {0} (expected liveness, balance, query, proxy or broadcast)")]
    UnknownProfile(String),

    #[error("Invalid proxy URL: {0}")]
    InvalidProxy(String),

    #[error("HTTP client init failed: {0}")]
    HttpClientInit(String),

    #[error("Config file parse error: {0}")]
    ParseError(#[from] toml::de::Error),
}

/// Cache store errors
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Failed to read cache file: {0}")]
    ReadError(String),

    #[error("Failed to write cache file: {0}")]
    WriteError(String),

    #[error("Cache entry for {key} could not be decoded: {reason}")]
    Corrupted { key: String, reason: String },
}

/// Output-related errors
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Failed to write JSON: {0}")]
    JsonWrite(String),

    #[error("Failed to write CSV: {0}")]
    CsvWrite(String),

    #[error("Failed to create output file: {0}")]
    FileCreate(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Other(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert_eq!(FailureKind::from_status(401), FailureKind::Unauthorized);
        assert_eq!(FailureKind::from_status(403), FailureKind::Unauthorized);
        assert_eq!(FailureKind::from_status(503), FailureKind::HttpError(503));
        assert_eq!(FailureKind::from_status(429), FailureKind::HttpError(429));
    }

    #[test]
    fn test_fetch_error_display() {
        let err = FetchError::new(FailureKind::HttpError(502), "bad gateway");
        assert_eq!(err.to_string(), "HTTP 502: bad gateway");

        let wrapped: Error = err.into();
        assert!(wrapped.to_string().starts_with("Fetch error:"));
    }
}

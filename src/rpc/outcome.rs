//! Classified result of one logical request

use crate::error::{FailureKind, FetchError};
use serde::Serialize;

/// Result of a logical request. Every executor exit path produces one.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome<T> {
    /// The request succeeded against `endpoint_used`
    Success { value: T, endpoint_used: String },
    /// Every attempt failed; `kind` is the last observed failure
    Failure { kind: FailureKind, message: String },
}

impl<T> Outcome<T> {
    pub fn success(value: T, endpoint_used: impl Into<String>) -> Self {
        Outcome::Success {
            value,
            endpoint_used: endpoint_used.into(),
        }
    }

    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        Outcome::Failure {
            kind,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    /// The value, if successful
    pub fn value(&self) -> Option<&T> {
        match self {
            Outcome::Success { value, .. } => Some(value),
            Outcome::Failure { .. } => None,
        }
    }

    /// Endpoint that served a successful request
    pub fn endpoint_used(&self) -> Option<&str> {
        match self {
            Outcome::Success { endpoint_used, .. } => Some(endpoint_used),
            Outcome::Failure { .. } => None,
        }
    }

    /// Failure classification, if failed
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Outcome::Success { .. } => None,
            Outcome::Failure { kind, .. } => Some(*kind),
        }
    }

    /// Transform a successful value
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Outcome<U> {
        match self {
            Outcome::Success {
                value,
                endpoint_used,
            } => Outcome::Success {
                value: f(value),
                endpoint_used,
            },
            Outcome::Failure { kind, message } => Outcome::Failure { kind, message },
        }
    }

    /// Convert into a `Result`, dropping the endpoint
    pub fn into_result(self) -> Result<T, FetchError> {
        match self {
            Outcome::Success { value, .. } => Ok(value),
            Outcome::Failure { kind, message } => Err(FetchError { kind, message }),
        }
    }

    /// The value, or `default` on failure
    pub fn value_or(self, default: T) -> T {
        self.into_result().unwrap_or(default)
    }
}

impl<T> From<FetchError> for Outcome<T> {
    fn from(err: FetchError) -> Self {
        Outcome::Failure {
            kind: err.kind,
            message: err.message,
        }
    }
}

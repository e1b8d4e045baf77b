//! Service Worker error types

use thiserror::Error;

use super::WorkerState;

/// Cache store errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    /// Store would grow past its quota
    #[error("quota exceeded: {needed} bytes requested, {available} available")]
    QuotaExceeded { needed: usize, available: usize },
    /// Response body was already read by another consumer
    #[error(transparent)]
    BodyUsed(#[from] BodyUsedError),
    /// Backend storage failure
    #[error("storage error: {0}")]
    Storage(String),
}

/// A response body can be read at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("response body already consumed")]
pub struct BodyUsedError;

/// Network errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetworkError {
    /// No route to the server (offline)
    #[error("network unreachable")]
    Unreachable,
    /// Request timed out
    #[error("request timed out")]
    Timeout,
    /// URL could not be resolved against the worker origin
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    /// Server answered with a status that cannot be stored
    #[error("bad status {status} for {url}")]
    BadStatus { url: String, status: u16 },
    /// Anything else reported by the host
    #[error("{0}")]
    Other(String),
}

/// Host (page / platform) errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("host error: {0}")]
pub struct HostError(pub String);

/// Worker errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkerError {
    /// Lifecycle transition not allowed from the current state
    #[error("invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: WorkerState, to: WorkerState },
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Network(#[from] NetworkError),
    #[error(transparent)]
    Host(#[from] HostError),
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config document is not valid JSON for [`WorkerConfig`](super::WorkerConfig)
    #[error("invalid config json: {0}")]
    Json(#[from] serde_json::Error),
    /// A no-cache pattern does not compile
    #[error("invalid no-cache pattern `{pattern}`: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    /// Cache version is empty
    #[error("cache version must not be empty")]
    EmptyVersion,
    /// Origin is not an absolute http(s) URL
    #[error("invalid origin `{0}`")]
    InvalidOrigin(String),
    /// Offline page would never be available
    #[error("offline page {0} is not in the static asset manifest")]
    OfflinePageNotPrecached(String),
}

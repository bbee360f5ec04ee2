//! Crate-wide error hierarchy for mr-reviewer.
//!
//! Goals:
//! - Single root `Error` for all public functions.
//! - Provider-aware mapping (401→Unauthorized, 429→RateLimited, 5xx→Server, etc.).
//! - No dynamic dispatch, ergonomic `?` via `From` impls.
//!
//! Most pipeline stages never return these: per-item failures are logged and
//! folded into typed outcomes. Errors surface from configuration, provider
//! I/O in the adapters, and the dispatch queue.

use thiserror::Error;

/// Convenient alias for crate-wide results.
pub type MrResult<T> = Result<T, Error>;

/// Root error type for the mr-reviewer crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Provider (GitLab) related failure.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Configuration problems (bad numbers, missing tokens, base URL, etc.).
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Ignore-pattern evaluation failure.
    #[error(transparent)]
    Ignore(#[from] IgnoreError),

    /// Completion output could not be turned into line findings.
    #[error(transparent)]
    Findings(#[from] FindingsError),

    /// Review queue failures (full, closed).
    #[error(transparent)]
    Queue(#[from] QueueError),

    /// Input validation errors (bad IDs, etc.).
    #[error("validation error: {0}")]
    Validation(String),
}

/// Detailed provider-specific error used inside the Provider layer.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Unauthorized (HTTP 401).
    #[error("unauthorized")]
    Unauthorized,

    /// Forbidden (HTTP 403).
    #[error("forbidden")]
    Forbidden,

    /// Not found (HTTP 404).
    #[error("not found")]
    NotFound,

    /// Rate limited (HTTP 429).
    #[error("rate limited")]
    RateLimited { retry_after_secs: Option<u64> },

    /// Gateway/Server error (HTTP 5xx).
    #[error("server error: status {0}")]
    Server(u16),

    /// Other HTTP status (4xx/3xx) not covered above.
    #[error("http status error: {0}")]
    HttpStatus(u16),

    /// Timeout at transport level.
    #[error("timeout")]
    Timeout,

    /// Network/transport failure without status (DNS/connect/reset).
    #[error("network error: {0}")]
    Network(String),

    /// JSON deserialization error.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Unexpected/invalid shape of provider response.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Configuration and setup errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing provider token")]
    MissingToken,

    #[error("invalid base api url: {0}")]
    InvalidBaseUrl(String),

    #[error("invalid number in {var}: {value:?}")]
    InvalidNumber { var: &'static str, value: String },

    #[error("{field} must be at least 1")]
    ZeroLimit { field: &'static str },

    #[error("cannot read ignore file {path}: {source}")]
    IgnoreFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Path evaluation failures of the ignore matcher.
#[derive(Debug, Error)]
pub enum IgnoreError {
    #[error("path escapes the matcher root: {0}")]
    EscapesRoot(String),
}

/// Failures while decoding completion output into findings.
#[derive(Debug, Error)]
pub enum FindingsError {
    #[error("completion output is not JSON: {0}")]
    NotJson(#[from] serde_json::Error),

    #[error("completion output holds no finding list")]
    NoList,
}

/// Bounded review queue errors.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("review queue is full (capacity {capacity})")]
    Full { capacity: usize },

    #[error("review queue is closed")]
    Closed,
}

// ===== Conversions for `?` ergonomics =====

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Provider(ProviderError::from(e))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        // JSON at the crate root comes from provider payloads.
        Error::Provider(ProviderError::Serde(e))
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return ProviderError::Timeout;
        }
        if let Some(status) = e.status() {
            return ProviderError::from_status(status.as_u16());
        }
        ProviderError::Network(e.to_string())
    }
}

impl ProviderError {
    /// Maps a non-success HTTP status to a provider error.
    pub fn from_status(code: u16) -> Self {
        match code {
            401 => ProviderError::Unauthorized,
            403 => ProviderError::Forbidden,
            404 => ProviderError::NotFound,
            429 => ProviderError::RateLimited {
                retry_after_secs: None,
            },
            500..=599 => ProviderError::Server(code),
            _ => ProviderError::HttpStatus(code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert!(matches!(
            ProviderError::from_status(401),
            ProviderError::Unauthorized
        ));
        assert!(matches!(
            ProviderError::from_status(429),
            ProviderError::RateLimited { .. }
        ));
        assert!(matches!(
            ProviderError::from_status(502),
            ProviderError::Server(502)
        ));
        assert!(matches!(
            ProviderError::from_status(409),
            ProviderError::HttpStatus(409)
        ));
    }
}

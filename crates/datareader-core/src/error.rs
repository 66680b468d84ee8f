//! Error types for data operations.
//!
//! This module defines [`DataError`] which covers every failure a reader can
//! report: validation before any I/O, transport and HTTP status failures
//! surfaced by the retrying client, soft errors embedded in provider
//! payloads, parse failures and cache failures.

use std::fmt;

use thiserror::Error;

/// Stage of an HTTP fetch at which a transport failure happened.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FetchStage {
    /// Building or cloning the outbound request.
    Build,
    /// Executing the request on the wire.
    Execute,
    /// Draining the response body.
    Body,
}

impl fmt::Display for FetchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            Self::Build => "building request",
            Self::Execute => "executing request",
            Self::Body => "reading response body",
        };
        f.write_str(stage)
    }
}

/// Errors that can occur during data operations.
#[derive(Error, Debug)]
pub enum DataError {
    /// The symbol was rejected before any request was made.
    #[error("Invalid symbol {symbol:?}: {reason}")]
    InvalidSymbol {
        /// The rejected symbol.
        symbol: String,
        /// Why it was rejected.
        reason: String,
    },

    /// An invalid parameter was provided (date range, symbol list, source name).
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Transport failure (DNS, connection, timeout) after retries were exhausted.
    #[error("Transport error while {stage} for {url}: {message}")]
    Transport {
        /// Which part of the fetch failed.
        stage: FetchStage,
        /// The request URL.
        url: String,
        /// The underlying cause.
        message: String,
    },

    /// The server answered with a non-success status.
    #[error("HTTP {status} {reason} for {url}")]
    HttpStatus {
        /// Numeric status code.
        status: u16,
        /// Canonical reason phrase.
        reason: String,
        /// The request URL.
        url: String,
    },

    /// A provider reported a rate-limit notice inside its payload.
    #[error("Rate limited by {provider}: {message}")]
    RateLimited {
        /// The provider that rate limited the request.
        provider: String,
        /// The notice returned by the provider.
        message: String,
    },

    /// A provider reported an application-level error inside its payload.
    #[error("{provider} returned an error: {message}")]
    Provider {
        /// The provider that reported the error.
        provider: String,
        /// The message returned by the provider.
        message: String,
    },

    /// The requested symbol was not found in the provider response.
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    /// Error parsing data from a provider.
    #[error("Parse error: {0}")]
    Parse(String),

    /// A calendar date that does not exist.
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    /// Error interacting with the cache.
    #[error("Cache error: {0}")]
    Cache(String),

    /// A cache operation was issued while caching is disabled.
    #[error("Cache is not configured")]
    NilCache,

    /// The provider needs an API key or token that was not configured.
    #[error("Missing credentials for provider {0}")]
    MissingCredentials(String),

    /// The caller cancelled the operation.
    #[error("Operation cancelled")]
    Cancelled,

    /// Any other error.
    #[error("{0}")]
    Other(String),
}

impl DataError {
    /// Returns true for the sentinel reported by a disabled cache.
    #[must_use]
    pub const fn is_nil_cache(&self) -> bool {
        matches!(self, Self::NilCache)
    }

    /// Returns true for failures the retrying client would have retried.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::HttpStatus { status, .. } => *status >= 500 && *status < 600,
            _ => false,
        }
    }

    /// Returns true for errors raised before any I/O took place.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidSymbol { .. } | Self::InvalidParameter(_)
        )
    }

    /// Builds an [`DataError::InvalidSymbol`] for `symbol`.
    #[must_use]
    pub fn invalid_symbol(symbol: &str, reason: impl Into<String>) -> Self {
        Self::InvalidSymbol {
            symbol: symbol.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type alias using [`DataError`].
pub type Result<T> = std::result::Result<T, DataError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        let server = DataError::HttpStatus {
            status: 503,
            reason: "Service Unavailable".to_string(),
            url: "http://localhost".to_string(),
        };
        let missing = DataError::HttpStatus {
            status: 404,
            reason: "Not Found".to_string(),
            url: "http://localhost".to_string(),
        };

        assert!(server.is_retryable());
        assert!(!missing.is_retryable());
        assert!(!DataError::Parse("bad".to_string()).is_retryable());
    }

    #[test]
    fn test_transport_message_keeps_cause() {
        let err = DataError::Transport {
            stage: FetchStage::Body,
            url: "http://localhost/data".to_string(),
            message: "connection reset".to_string(),
        };
        let text = err.to_string();

        assert!(text.contains("reading response body"));
        assert!(text.contains("connection reset"));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_nil_cache_sentinel() {
        assert!(DataError::NilCache.is_nil_cache());
        assert!(!DataError::Cache("disk full".to_string()).is_nil_cache());
    }
}

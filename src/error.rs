//! Application error types for gateway-sync
//!
//! This module defines the error types used throughout the application.
//! All error types use `thiserror` for ergonomic error handling.

use std::time::Duration;
use thiserror::Error;

use crate::config::ConfigError;

/// Extra pause added on top of a server-provided `Retry-After` hint
pub const RATE_LIMIT_GRACE: Duration = Duration::from_millis(500);

/// Errors produced by calls against the gateway API
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ApiError {
    /// Network timeout
    #[error("Network timeout")]
    NetworkTimeout,

    /// Connection refused
    #[error("Connection refused")]
    ConnectionRefused,

    /// Generic network error
    #[error("Network error: {0}")]
    Network(String),

    /// Rate limited by the API, with the optional `Retry-After` hint in seconds
    #[error("Rate limited: 429")]
    RateLimited(Option<u64>),

    /// Non-success HTTP status
    #[error("HTTP {status}: {body}")]
    Http {
        /// Response status code
        status: u16,
        /// Response body, as text
        body: String,
    },

    /// The request could not be built
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The request body could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The response body could not be decoded
    #[error("Invalid response: {0}")]
    Decode(String),

    /// The API answered with `success: false`
    #[error("API error: {0}")]
    Api(String),

    /// The operation was cancelled
    #[error("Operation cancelled")]
    Cancelled,
}

/// Errors produced while downloading domain lists
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DownloadError {
    /// Transport failure
    #[error("Download of {url} failed: {message}")]
    Network {
        /// Source URL
        url: String,
        /// Underlying error
        message: String,
    },

    /// Source answered with a non-success status
    #[error("HTTP {status} from {url}")]
    HttpStatus {
        /// Response status code
        status: u16,
        /// Source URL
        url: String,
    },

    /// Response body could not be read
    #[error("Failed to read {url}: {message}")]
    Read {
        /// Source URL
        url: String,
        /// Underlying error
        message: String,
    },

    /// The HTTP client could not be created
    #[error("Failed to create HTTP client: {0}")]
    Client(String),

    /// The download was cancelled
    #[error("Download cancelled")]
    Cancelled,
}

/// Errors that abort a reconciliation run
///
/// Each variant names the step that failed and wraps the API error behind it.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ReconcileError {
    /// Rules could not be listed for cleanup
    #[error("Cleanup of old rules failed: {0}")]
    CleanupRules(#[source] ApiError),

    /// Lists could not be listed for cleanup
    #[error("Cleanup of old lists failed: {0}")]
    CleanupLists(#[source] ApiError),

    /// A list chunk could not be created
    #[error("Failed to create list {name}: {source}")]
    CreateList {
        /// Generated list name
        name: String,
        /// Underlying API error
        #[source]
        source: ApiError,
    },

    /// The DNS rule could not be created or updated
    #[error("Failed to create DNS rule: {0}")]
    DnsRule(#[source] ApiError),

    /// The SNI rule could not be created or updated
    #[error("Failed to create SNI rule: {0}")]
    SniRule(#[source] ApiError),

    /// The run was cancelled
    #[error("Reconciliation cancelled")]
    Cancelled,
}

/// Application-level error type
///
/// Aggregates the domain-specific error types.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// API error
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Download error
    #[error("Download error: {0}")]
    Download(#[from] DownloadError),

    /// Reconciliation error
    #[error("Reconciliation error: {0}")]
    Reconcile(#[from] ReconcileError),

    /// Logging setup error
    #[error("Logging error: {0}")]
    Logging(String),
}

/// Trait for determining if an error is retryable
pub trait RetryableError {
    /// Returns true if the error is retryable
    fn is_retryable(&self) -> bool;

    /// Extra wait the server asked for before the next attempt
    fn cooldown(&self) -> Option<Duration> {
        None
    }
}

impl RetryableError for ApiError {
    fn is_retryable(&self) -> bool {
        match self {
            // Retryable errors
            ApiError::NetworkTimeout => true,
            ApiError::ConnectionRefused => true,
            ApiError::Network(_) => true,
            ApiError::RateLimited(_) => true,
            ApiError::Http { status, .. } => !matches!(status, 401 | 403),

            // Non-retryable errors
            ApiError::InvalidRequest(_) => false,
            ApiError::Serialization(_) => false,
            ApiError::Decode(_) => false,
            ApiError::Api(_) => false,
            ApiError::Cancelled => false,
        }
    }

    fn cooldown(&self) -> Option<Duration> {
        match self {
            ApiError::RateLimited(Some(secs)) => {
                Some(Duration::from_secs(*secs).saturating_add(RATE_LIMIT_GRACE))
            }
            _ => None,
        }
    }
}

impl RetryableError for DownloadError {
    fn is_retryable(&self) -> bool {
        match self {
            DownloadError::Network { .. } => true,
            DownloadError::Read { .. } => true,
            DownloadError::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            DownloadError::Client(_) => false,
            DownloadError::Cancelled => false,
        }
    }
}

//! Error types for GLOSSA operations

use std::time::Duration;
use thiserror::Error;

/// Failures talking to the SPARQL endpoint.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Request to {endpoint} failed: {reason}")]
    RequestFailed { endpoint: String, reason: String },

    #[error("Endpoint {endpoint} answered with status {status}: {message}")]
    Status {
        endpoint: String,
        status: u16,
        message: String,
    },

    #[error("Query timed out after {elapsed:?}")]
    Timeout { elapsed: Duration },

    #[error("Query executor unavailable: {reason}")]
    Unavailable { reason: String },
}

/// Failures decoding an endpoint response into statements.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Syntax error at line {line}: {reason}")]
    Syntax { line: usize, reason: String },

    #[error("Response body is not valid UTF-8: {reason}")]
    InvalidEncoding { reason: String },

    #[error("Unsupported response content type: {content_type}")]
    UnsupportedContentType { content_type: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all GLOSSA errors.
#[derive(Debug, Clone, Error)]
pub enum GlossaError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("No async runtime available: {reason}")]
    RuntimeUnavailable { reason: String },
}

impl GlossaError {
    /// True for errors produced while fetching a batch (transport or decode).
    pub fn is_fetch_failure(&self) -> bool {
        matches!(self, GlossaError::Transport(_) | GlossaError::Parse(_))
    }
}

/// Result type alias for GLOSSA operations.
pub type GlossaResult<T> = Result<T, GlossaError>;

// =============================================================================
// TESTS
// =============================================================================

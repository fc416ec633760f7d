//! Core error types for LeadRelay.
//!
//! Transport-specific concerns (HTTP status codes, response bodies) live in the
//! server crate, which maps these errors onto responses.

use thiserror::Error;

/// Type alias for Result using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Root error type for the core crate.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Input validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Outbound request failed: {0}")]
    Outbound(#[from] OutboundError),

    #[error("Invalid configuration value: {0}")]
    InvalidConfigValue(String),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

/// Validation errors for inbound payloads.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field '{0}' is missing")]
    MissingField(String),

    #[error("Invalid value for '{field}': {reason}")]
    InvalidField { field: String, reason: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl ValidationError {
    pub fn invalid(field: &str, reason: impl Into<String>) -> Self {
        ValidationError::InvalidField {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Errors raised while talking to an external system (e-mail API, workflow webhook).
#[derive(Error, Debug)]
pub enum OutboundError {
    /// The destination is not configured for this process.
    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    /// The upstream answered with a non-success status.
    #[error("Upstream responded with {status}: {body}")]
    Upstream { status: u16, body: String },

    /// The upstream could not be reached (DNS, connect, timeout).
    #[error("Upstream unreachable: {0}")]
    Unreachable(String),

    /// Building the request or reading the response failed.
    #[error("Invalid upstream exchange: {0}")]
    Invalid(String),
}

impl From<reqwest::Error> for OutboundError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            OutboundError::Unreachable(err.to_string())
        } else if let Some(status) = err.status() {
            OutboundError::Upstream {
                status: status.as_u16(),
                body: err.to_string(),
            }
        } else {
            OutboundError::Invalid(err.to_string())
        }
    }
}

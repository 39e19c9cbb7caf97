//! Store error types.
//!
//! This module defines the errors that can occur while talking to the search
//! index or the engine's record indices.

use thiserror::Error;

/// Errors that can occur during storage operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Failed to reach the store, or the request timed out.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The store answered with an error status.
    #[error("Request failed with status {status}: {message}")]
    RequestError { status: u16, message: String },

    /// Failed to parse a response from the store.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// The request was rejected before it was sent.
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// The addressed index or document does not exist.
    #[error("Not found: {0}")]
    NotFound(String),
}

impl StoreError {
    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionError(msg.into())
    }

    /// Create a request error.
    pub fn request(status: u16, msg: impl Into<String>) -> Self {
        Self::RequestError {
            status,
            message: msg.into(),
        }
    }

    /// Create a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    /// Create a not found error.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Whether retrying the same request later can succeed.
    ///
    /// Connectivity loss, timeouts, throttling and unavailable nodes are
    /// transient; everything else needs a different request.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::ConnectionError(_) => true,
            StoreError::RequestError { status, .. } => is_transient_status(*status),
            StoreError::ParseError(_)
            | StoreError::ValidationError(_)
            | StoreError::NotFound(_) => false,
        }
    }
}

/// HTTP statuses that signal a temporary condition on the store side.
pub(crate) fn is_transient_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 502 | 503 | 504)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(StoreError::connection("reset by peer").is_transient());
        assert!(StoreError::request(429, "too many requests").is_transient());
        assert!(StoreError::request(503, "unavailable").is_transient());
        assert!(!StoreError::request(400, "bad request").is_transient());
        assert!(!StoreError::parse("unexpected body").is_transient());
        assert!(!StoreError::not_found("optimize-metadata").is_transient());
    }
}

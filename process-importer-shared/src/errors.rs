//! Error types for decoding engine records and identifiers.

use thiserror::Error;

/// Errors that can occur while decoding exported engine data.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// The exported record does not have the expected shape.
    #[error("Malformed record: {0}")]
    Malformed(String),

    /// The exported record carries a value type this importer does not know.
    #[error("Unknown value type: {0}")]
    UnknownValueType(String),

    /// The record timestamp cannot be represented.
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(i64),

    /// A record type name could not be parsed.
    #[error("Unknown record type: {0}")]
    UnknownRecordType(String),

    /// A schema version string could not be parsed.
    #[error("Invalid schema version: {0}")]
    InvalidVersion(String),
}

impl DecodeError {
    /// Create a malformed record error.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }
}

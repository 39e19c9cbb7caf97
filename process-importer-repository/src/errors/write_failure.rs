//! Per-document write failures reported by bulk writes.

use thiserror::Error;

use super::store_error::is_transient_status;

/// Why one document of a bulk write was not applied.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WriteFailure {
    /// The store could not apply the item right now (throttling, overload).
    #[error("Transient write failure: {0}")]
    Transient(String),

    /// The item can never be applied as is (mapping conflict, missing document).
    #[error("Permanent write failure: {0}")]
    Permanent(String),
}

impl WriteFailure {
    /// Create a transient failure.
    pub fn transient(reason: impl Into<String>) -> Self {
        Self::Transient(reason.into())
    }

    /// Create a permanent failure.
    pub fn permanent(reason: impl Into<String>) -> Self {
        Self::Permanent(reason.into())
    }

    /// Classify a failed bulk item by its HTTP status.
    pub fn from_item_status(status: u16, reason: impl Into<String>) -> Self {
        if is_transient_status(status) {
            Self::transient(reason)
        } else {
            Self::permanent(reason)
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, WriteFailure::Transient(_))
    }

    pub fn reason(&self) -> &str {
        match self {
            WriteFailure::Transient(reason) | WriteFailure::Permanent(reason) => reason,
        }
    }
}

//! Error types for the import pipeline.

use process_importer_repository::StoreError;
use process_importer_shared::{DecodeError, DocumentKey, ImportPair, Position};
use thiserror::Error;

/// A page that was read but cannot be imported as is.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    /// A record does not decode, belongs to another pair, or the page is
    /// larger than requested.
    #[error("Malformed record page: {0}")]
    Malformed(String),

    /// The engine log returned a record at or below the page position.
    #[error("Position regression: record at {position} is not after {after}")]
    PositionRegression { after: Position, position: Position },

    /// Positions within the page are not ascending.
    #[error("Records out of order: {position} follows {previous}")]
    OutOfOrder { previous: Position, position: Position },
}

impl FetchError {
    /// Create a malformed page error.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }
}

impl From<DecodeError> for FetchError {
    fn from(err: DecodeError) -> Self {
        Self::Malformed(err.to_string())
    }
}

/// Errors that can fail one import cycle.
///
/// Every variant leaves the cursor where it was, so the scheduler retries the
/// whole page on the next cycle.
#[derive(Error, Debug)]
pub enum ImportError {
    /// The record source or the search index could not be reached.
    #[error("Transport error: {0}")]
    Transport(#[from] StoreError),

    /// The fetched page failed validation.
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// A bulk write request failed as a whole.
    #[error("Write error: {0}")]
    Write(StoreError),

    /// Some mutations of the page were not applied.
    #[error("{failed} of {total} mutations failed, first {first}: {reason}")]
    IncompleteBatch {
        total: usize,
        failed: usize,
        /// Failures the store will reject again on replay.
        permanent: usize,
        first: DocumentKey,
        reason: String,
    },

    /// The cursor could not be loaded or stored.
    #[error("Cursor error for {pair}: {source}")]
    Cursor { pair: ImportPair, source: StoreError },

    /// Committing would move the cursor backwards.
    #[error("Cursor regression for {pair}: stored {stored}, attempted {attempted}")]
    CursorRegression {
        pair: ImportPair,
        stored: Position,
        attempted: Position,
    },
}

impl ImportError {
    /// Create a cursor error.
    pub fn cursor(pair: ImportPair, source: StoreError) -> Self {
        Self::Cursor { pair, source }
    }

    /// Whether the same cycle can succeed later without operator action.
    ///
    /// Non-transient errors are still retried by the scheduler, but logged at
    /// error level because they block their pair until someone intervenes.
    pub fn is_transient(&self) -> bool {
        match self {
            ImportError::Transport(e) | ImportError::Write(e) => e.is_transient(),
            ImportError::Cursor { source, .. } => source.is_transient(),
            ImportError::Fetch(FetchError::Malformed(_)) => true,
            ImportError::Fetch(_) => false,
            ImportError::IncompleteBatch { permanent, .. } => *permanent == 0,
            ImportError::CursorRegression { .. } => false,
        }
    }
}

//! Error types for schema upgrades.

use process_importer_repository::StoreError;
use process_importer_shared::SchemaVersion;
use thiserror::Error;

/// Errors that can occur while bootstrapping or upgrading the indices.
#[derive(Error, Debug)]
pub enum UpgradeError {
    /// A step failed. Steps before it stay applied; nothing is rolled back.
    #[error("Upgrade step {step_index} of {version} ({action} on {target_index}) failed: {reason}")]
    StepFailed {
        version: SchemaVersion,
        step_index: usize,
        target_index: String,
        action: String,
        reason: String,
    },

    /// Reading or writing upgrade metadata failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The indices are not at the version this build imports into.
    #[error("Schema version is {}, expected {expected}; run the upgrade first", .installed.map(|v| v.to_string()).unwrap_or_else(|| "not installed".to_string()))]
    SchemaNotCurrent {
        installed: Option<SchemaVersion>,
        expected: SchemaVersion,
    },

    /// The compiled plan catalog is inconsistent.
    #[error("Invalid upgrade catalog: {0}")]
    InvalidCatalog(String),
}

impl UpgradeError {
    /// Create an invalid catalog error.
    pub fn invalid_catalog(msg: impl Into<String>) -> Self {
        Self::InvalidCatalog(msg.into())
    }
}

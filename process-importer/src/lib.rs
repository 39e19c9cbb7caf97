//! # Process Importer
//!
//! Main library for the process importer binary.
//!
//! This crate provides the configuration, dependency wiring and commands
//! behind the `process-importer` executable.

pub mod commands;
pub mod config;

pub use config::{Dependencies, Settings};

use thiserror::Error;

/// Errors that can occur during importer initialization or execution.
#[derive(Error, Debug)]
pub enum ImporterError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Store error.
    #[error("Store error: {0}")]
    StoreError(#[from] process_importer_repository::StoreError),

    /// Import error.
    #[error("Import error: {0}")]
    ImportError(#[from] process_importer_pipeline::ImportError),

    /// Upgrade error.
    #[error("Upgrade error: {0}")]
    UpgradeError(#[from] process_importer_upgrade::UpgradeError),
}

impl ImporterError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use process_importer_shared::SchemaVersion;
    use process_importer_upgrade::UpgradeError;

    #[test]
    fn test_upgrade_errors_convert() {
        let err: ImporterError = UpgradeError::SchemaNotCurrent {
            installed: Some(SchemaVersion::new(3, 0, 0)),
            expected: SchemaVersion::new(3, 2, 0),
        }
        .into();

        assert_eq!(
            err.to_string(),
            "Upgrade error: Schema version is 3.0.0, expected 3.2.0; run the upgrade first"
        );
    }
}

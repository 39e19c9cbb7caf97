//! Index naming for the process importer.

use process_importer_shared::{DocumentIndex, RecordType};

/// Default prefix of importer-owned indices.
pub const DEFAULT_INDEX_PREFIX: &str = "optimize";

/// Default prefix of the engine exporter's record indices.
pub const DEFAULT_EXPORTER_PREFIX: &str = "zeebe-record";

/// Resolves logical indices to physical index names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexNames {
    /// Prefix of the indices the importer owns.
    pub prefix: String,
    /// Prefix of the indices the engine exporter writes records to.
    pub exporter_prefix: String,
}

impl Default for IndexNames {
    fn default() -> Self {
        Self::new(DEFAULT_INDEX_PREFIX, DEFAULT_EXPORTER_PREFIX)
    }
}

impl IndexNames {
    pub fn new(prefix: impl Into<String>, exporter_prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            exporter_prefix: exporter_prefix.into(),
        }
    }

    /// Name of a document index, e.g. `optimize-process-instance`.
    pub fn document_index(&self, index: DocumentIndex) -> String {
        format!("{}-{}", self.prefix, index.as_str())
    }

    /// Name of the index holding import cursors.
    pub fn position_import(&self) -> String {
        format!("{}-position-import", self.prefix)
    }

    /// Name of the index holding the schema version and applied upgrade steps.
    pub fn metadata(&self) -> String {
        format!("{}-metadata", self.prefix)
    }

    /// Wildcard pattern matching every exporter index for a record type,
    /// e.g. `zeebe-record_process-instance_*`.
    pub fn exporter_pattern(&self, record_type: RecordType) -> String {
        format!("{}_{}_*", self.exporter_prefix, record_type.exporter_segment())
    }
}

//! # Process Importer Repository
//!
//! This crate provides the storage seams of the process importer and their
//! implementations. It includes definitions for errors, interfaces, an
//! OpenSearch implementation, and an in-memory implementation used by tests
//! and local runs.

pub mod config;
pub mod errors;
pub mod interfaces;
pub mod memory;
pub mod opensearch;
pub mod types;

pub use config::IndexNames;
pub use errors::{StoreError, WriteFailure};
pub use interfaces::{CursorStore, DocumentStore, IndexAdmin, RecordSource, UpgradeMarkerStore};
pub use memory::{InMemoryIndex, InMemoryRecordSource};
pub use opensearch::OpenSearchClient;
pub use types::{AppliedStep, BulkItemResult, DocumentFilter, FieldUpdate};

//! In-memory implementations of the storage interfaces.
//!
//! These mirror the OpenSearch semantics the importer relies on (bulk items
//! applied in order, upserts merging fields, partial updates failing on
//! missing documents) and add failure injection so tests can exercise the
//! transient and permanent failure paths.

mod index;
mod record_source;

pub use index::{InMemoryIndex, IndexContents, IndexSnapshot};
pub use record_source::InMemoryRecordSource;

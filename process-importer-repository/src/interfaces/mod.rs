//! Interface definitions for the process importer's storage seams.
//!
//! Each trait is an injection point: the pipeline and the upgrade executor
//! depend only on these, so the OpenSearch backend can be swapped for the
//! in-memory one in tests.

mod cursor_store;
mod document_store;
mod index_admin;
mod record_source;
mod upgrade_marker_store;

pub use cursor_store::CursorStore;
pub use document_store::DocumentStore;
pub use index_admin::IndexAdmin;
pub use record_source::RecordSource;
pub use upgrade_marker_store::UpgradeMarkerStore;

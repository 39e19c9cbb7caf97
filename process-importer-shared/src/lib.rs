//! # Process Importer Shared
//!
//! Domain types shared by every process importer crate: partitions and
//! positions of the engine log, raw records and their exported JSON form,
//! import pages and cursors, document mutations, and schema versions.

pub mod errors;
pub mod ids;
pub mod mutation;
pub mod page;
pub mod record;
pub mod version;

pub use errors::DecodeError;
pub use ids::{ImportPair, PartitionId, Position, RecordType};
pub use mutation::{DocumentIndex, DocumentKey, DocumentMutation, Fields, MutationOperation};
pub use page::{ImportCursor, ImportPage};
pub use record::{
    IncidentValue, Intent, ProcessDefinitionValue, ProcessInstanceValue, RawRecord,
    RecordPayload, VariableValue, DEFAULT_TENANT_ID,
};
pub use version::SchemaVersion;

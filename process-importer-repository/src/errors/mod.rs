//! Error types for the process importer repository.

mod store_error;
mod write_failure;

pub use store_error::StoreError;
pub use write_failure::WriteFailure;

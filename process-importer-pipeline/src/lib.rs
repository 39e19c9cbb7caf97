//! # Process Importer Pipeline
//!
//! This crate provides the pipeline components that import engine records
//! from the exporter indices into the importer's document indices.
//!
//! ## Architecture
//!
//! Each (partition, record type) pair runs its own import cycle:
//!
//! 1. **Fetcher**: Reads and validates a page of records after the cursor
//! 2. **Transformer**: Maps records to document mutations
//! 3. **Writer**: Applies the mutations with bulk requests
//! 4. **Scheduler**: Drives the cycle and commits the cursor
//!
//! The registry starts one scheduler task per pair and stops them on
//! shutdown.

pub mod errors;
pub mod fetcher;
pub mod scheduler;
pub mod transformer;
pub mod writer;

pub use errors::{FetchError, ImportError};
pub use fetcher::{FetchedPage, FetcherConfig, RecordFetcher};
pub use scheduler::{
    CycleOutcome, ImportProgress, ImportRegistry, ImportScheduler, PairState, RunningImport,
    SchedulerConfig, StopReport,
};
pub use transformer::RecordTransformer;
pub use writer::{BatchResult, BatchWriter, WriterConfig};

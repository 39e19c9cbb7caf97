//! Record fetcher for the import pipeline.
//!
//! Reads one page of engine records for an import pair and validates it
//! before anything downstream sees it.

use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::errors::{FetchError, ImportError};
use process_importer_repository::RecordSource;
use process_importer_shared::{ImportPage, RawRecord};

/// Configuration for the record fetcher.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Upper bound on the records requested per page, whatever the page asks
    /// for.
    pub max_batch_size: usize,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 10_000,
        }
    }
}

/// One validated page of records.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedPage {
    /// Ascending by position, duplicate positions dropped.
    pub records: Vec<RawRecord>,
    /// Records the source returned, duplicates included.
    pub received: usize,
    /// Records requested from the source.
    pub requested: usize,
}

impl FetchedPage {
    /// Whether the source filled the page, so more records are likely
    /// waiting.
    pub fn is_full(&self) -> bool {
        self.received >= self.requested
    }
}

/// Fetcher that reads validated record pages from the engine log.
///
/// A returned page is ascending by position, strictly after the page
/// position, and no longer than the requested batch size. The fetcher has no
/// side effects; calling it twice for the same page reads the same records.
pub struct RecordFetcher {
    source: Arc<dyn RecordSource>,
    config: FetcherConfig,
}

impl RecordFetcher {
    /// Create a new fetcher over the given record source.
    pub fn new(source: Arc<dyn RecordSource>) -> Self {
        Self {
            source,
            config: FetcherConfig::default(),
        }
    }

    /// Create a new fetcher with custom configuration.
    pub fn with_config(source: Arc<dyn RecordSource>, config: FetcherConfig) -> Self {
        Self { source, config }
    }

    /// Fetch the records of one page.
    ///
    /// # Returns
    ///
    /// * `Ok(page)` - Records possibly empty, ascending by position
    /// * `Err(ImportError::Transport)` - The record source could not be read
    /// * `Err(ImportError::Fetch)` - The source returned records that fail
    ///   validation; the page must not be skipped
    #[instrument(
        skip(self, page),
        fields(partition_id = %page.partition_id, record_type = %page.record_type, after = %page.position)
    )]
    pub async fn fetch(&self, page: &ImportPage) -> Result<FetchedPage, ImportError> {
        let batch_size = page.batch_size.min(self.config.max_batch_size);

        let raw = self
            .source
            .read_records(page.partition_id, page.record_type, page.position, batch_size)
            .await?;
        let received = raw.len();

        let records = validate_page(page, batch_size, raw).map_err(|e| {
            warn!(error = %e, "Fetched page failed validation");
            e
        })?;

        debug!(count = records.len(), received, "Fetched records");
        Ok(FetchedPage {
            records,
            received,
            requested: batch_size,
        })
    }
}

/// Decode and check one page of exported records.
fn validate_page(
    page: &ImportPage,
    batch_size: usize,
    raw: Vec<serde_json::Value>,
) -> Result<Vec<RawRecord>, FetchError> {
    if raw.len() > batch_size {
        return Err(FetchError::malformed(format!(
            "requested {} records, received {}",
            batch_size,
            raw.len()
        )));
    }

    let mut records: Vec<RawRecord> = Vec::with_capacity(raw.len());
    for source in raw {
        let record = RawRecord::from_exported(source)?;

        if record.partition_id != page.partition_id || record.record_type != page.record_type {
            return Err(FetchError::malformed(format!(
                "record at {} belongs to partition {} {}, expected {}",
                record.position,
                record.partition_id,
                record.record_type,
                page.pair()
            )));
        }

        if record.position <= page.position {
            return Err(FetchError::PositionRegression {
                after: page.position,
                position: record.position,
            });
        }

        if let Some(previous) = records.last().map(|r| r.position) {
            if record.position < previous {
                return Err(FetchError::OutOfOrder {
                    previous,
                    position: record.position,
                });
            }
            if record.position == previous {
                debug!(position = %record.position, "Dropping duplicate record");
                continue;
            }
        }

        records.push(record);
    }

    Ok(records)
}

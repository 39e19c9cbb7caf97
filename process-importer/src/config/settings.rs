//! Runtime settings, read from command-line options or the environment.

use clap::Args;
use std::time::Duration;

use crate::ImporterError;
use process_importer_pipeline::{FetcherConfig, SchedulerConfig, WriterConfig};
use process_importer_repository::config::{DEFAULT_EXPORTER_PREFIX, DEFAULT_INDEX_PREFIX};
use process_importer_repository::IndexNames;

/// Default OpenSearch URL.
pub const DEFAULT_OPENSEARCH_URL: &str = "http://localhost:9200";

/// Default OpenSearch request timeout (in milliseconds).
pub const DEFAULT_OPENSEARCH_TIMEOUT_MS: u64 = 30_000;

/// Default number of engine partitions to import.
pub const DEFAULT_PARTITION_COUNT: u32 = 1;

/// Default records requested per page.
pub const DEFAULT_IMPORT_BATCH_SIZE: usize = 500;

/// Default wait after an empty or short page (in milliseconds).
pub const DEFAULT_IMPORT_POLL_INTERVAL_MS: u64 = 1000;

/// Default upper bound on the backoff after failed cycles (in milliseconds).
pub const DEFAULT_IMPORT_MAX_BACKOFF_MS: u64 = 30_000;

/// Default retries of transiently failed documents.
pub const DEFAULT_WRITE_MAX_RETRIES: u32 = 3;

/// Default time pairs get to finish their cycle on shutdown (in milliseconds).
pub const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 10_000;

/// Settings shared by every command.
#[derive(Debug, Clone, Args)]
pub struct Settings {
    /// OpenSearch URL
    #[arg(long, env = "OPENSEARCH_URL", default_value = DEFAULT_OPENSEARCH_URL, global = true)]
    pub opensearch_url: String,

    /// Hard timeout of every OpenSearch request, in milliseconds
    #[arg(long, env = "OPENSEARCH_TIMEOUT_MS", default_value_t = DEFAULT_OPENSEARCH_TIMEOUT_MS, global = true)]
    pub opensearch_timeout_ms: u64,

    /// Prefix of the indices the importer owns
    #[arg(long, env = "INDEX_PREFIX", default_value = DEFAULT_INDEX_PREFIX, global = true)]
    pub index_prefix: String,

    /// Prefix of the indices the engine exporter writes records to
    #[arg(long, env = "EXPORTER_INDEX_PREFIX", default_value = DEFAULT_EXPORTER_PREFIX, global = true)]
    pub exporter_index_prefix: String,

    /// Number of engine partitions to import
    #[arg(long, env = "PARTITION_COUNT", default_value_t = DEFAULT_PARTITION_COUNT, global = true)]
    pub partition_count: u32,

    /// Records requested per page
    #[arg(long, env = "IMPORT_BATCH_SIZE", default_value_t = DEFAULT_IMPORT_BATCH_SIZE, global = true)]
    pub import_batch_size: usize,

    /// Wait after an empty or short page, in milliseconds
    #[arg(long, env = "IMPORT_POLL_INTERVAL_MS", default_value_t = DEFAULT_IMPORT_POLL_INTERVAL_MS, global = true)]
    pub import_poll_interval_ms: u64,

    /// Upper bound on the backoff after failed cycles, in milliseconds
    #[arg(long, env = "IMPORT_MAX_BACKOFF_MS", default_value_t = DEFAULT_IMPORT_MAX_BACKOFF_MS, global = true)]
    pub import_max_backoff_ms: u64,

    /// Retries of transiently failed documents
    #[arg(long, env = "WRITE_MAX_RETRIES", default_value_t = DEFAULT_WRITE_MAX_RETRIES, global = true)]
    pub write_max_retries: u32,

    /// Time pairs get to finish their cycle on shutdown, in milliseconds
    #[arg(long, env = "SHUTDOWN_TIMEOUT_MS", default_value_t = DEFAULT_SHUTDOWN_TIMEOUT_MS, global = true)]
    pub shutdown_timeout_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            opensearch_url: DEFAULT_OPENSEARCH_URL.to_string(),
            opensearch_timeout_ms: DEFAULT_OPENSEARCH_TIMEOUT_MS,
            index_prefix: DEFAULT_INDEX_PREFIX.to_string(),
            exporter_index_prefix: DEFAULT_EXPORTER_PREFIX.to_string(),
            partition_count: DEFAULT_PARTITION_COUNT,
            import_batch_size: DEFAULT_IMPORT_BATCH_SIZE,
            import_poll_interval_ms: DEFAULT_IMPORT_POLL_INTERVAL_MS,
            import_max_backoff_ms: DEFAULT_IMPORT_MAX_BACKOFF_MS,
            write_max_retries: DEFAULT_WRITE_MAX_RETRIES,
            shutdown_timeout_ms: DEFAULT_SHUTDOWN_TIMEOUT_MS,
        }
    }
}

impl Settings {
    /// Reject settings no importer can run with.
    pub fn validate(&self) -> Result<(), ImporterError> {
        if self.partition_count == 0 {
            return Err(ImporterError::config("PARTITION_COUNT must be at least 1"));
        }
        if self.import_batch_size == 0 {
            return Err(ImporterError::config("IMPORT_BATCH_SIZE must be at least 1"));
        }
        if self.index_prefix.is_empty() {
            return Err(ImporterError::config("INDEX_PREFIX must not be empty"));
        }
        if self.opensearch_timeout_ms == 0 {
            return Err(ImporterError::config("OPENSEARCH_TIMEOUT_MS must be positive"));
        }

        let max_batch_size = self.fetcher_config().max_batch_size;
        if self.import_batch_size > max_batch_size {
            return Err(ImporterError::config(format!(
                "IMPORT_BATCH_SIZE must be at most {}",
                max_batch_size
            )));
        }
        if self.import_poll_interval_ms == 0 {
            return Err(ImporterError::config("IMPORT_POLL_INTERVAL_MS must be positive"));
        }

        let initial_backoff_ms = self.scheduler_config().initial_backoff_ms;
        if self.import_max_backoff_ms < initial_backoff_ms {
            return Err(ImporterError::config(format!(
                "IMPORT_MAX_BACKOFF_MS must be at least {}",
                initial_backoff_ms
            )));
        }
        Ok(())
    }

    pub fn index_names(&self) -> IndexNames {
        IndexNames::new(&self.index_prefix, &self.exporter_index_prefix)
    }

    pub fn opensearch_timeout(&self) -> Duration {
        Duration::from_millis(self.opensearch_timeout_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    pub fn fetcher_config(&self) -> FetcherConfig {
        FetcherConfig::default()
    }

    pub fn writer_config(&self) -> WriterConfig {
        WriterConfig {
            max_retries: self.write_max_retries,
            ..WriterConfig::default()
        }
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            batch_size: self.import_batch_size,
            poll_interval_ms: self.import_poll_interval_ms,
            max_backoff_ms: self.import_max_backoff_ms,
            ..SchedulerConfig::default()
        }
    }
}

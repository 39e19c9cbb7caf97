//! Dependency initialization and wiring for the process importer.

use std::sync::Arc;
use tracing::info;

use crate::config::Settings;
use crate::ImporterError;
use process_importer_pipeline::{BatchWriter, ImportRegistry, RecordFetcher, RecordTransformer};
use process_importer_repository::{DocumentStore, OpenSearchClient};
use process_importer_upgrade::UpgradeExecutor;

/// Container for all initialized dependencies.
///
/// One OpenSearch client serves as record source, document store, cursor
/// store and upgrade metadata store.
pub struct Dependencies {
    pub settings: Settings,
    pub client: Arc<OpenSearchClient>,
}

impl Dependencies {
    /// Initialize all dependencies from the settings.
    ///
    /// # Returns
    ///
    /// * `Ok(Dependencies)` - Initialized dependencies
    /// * `Err(ImporterError)` - If the settings are invalid or OpenSearch is
    ///   unreachable
    pub async fn new(settings: Settings) -> Result<Self, ImporterError> {
        settings.validate()?;

        info!(
            opensearch_url = %settings.opensearch_url,
            index_prefix = %settings.index_prefix,
            exporter_index_prefix = %settings.exporter_index_prefix,
            partition_count = settings.partition_count,
            "Initializing dependencies"
        );

        let client = OpenSearchClient::new(
            &settings.opensearch_url,
            settings.index_names(),
            settings.opensearch_timeout(),
        )
        .map_err(|e| ImporterError::config(format!("Failed to create OpenSearch client: {}", e)))?;

        let healthy = client
            .health_check()
            .await
            .map_err(|e| ImporterError::config(format!("OpenSearch health check failed: {}", e)))?;

        if !healthy {
            return Err(ImporterError::config("OpenSearch cluster is unhealthy"));
        }

        info!("OpenSearch connection verified");

        Ok(Self {
            settings,
            client: Arc::new(client),
        })
    }

    /// Executor for the compiled upgrade plans.
    pub fn upgrade_executor(&self) -> UpgradeExecutor {
        UpgradeExecutor::new(
            self.client.clone(),
            self.client.clone(),
            self.settings.index_names(),
        )
    }

    /// Registry spawning one scheduler per import pair.
    pub fn import_registry(&self) -> ImportRegistry {
        let fetcher = RecordFetcher::with_config(self.client.clone(), self.settings.fetcher_config());
        let writer = BatchWriter::with_config(self.client.clone(), self.settings.writer_config());

        ImportRegistry::new(
            Arc::new(fetcher),
            Arc::new(RecordTransformer::new()),
            Arc::new(writer),
            self.client.clone(),
            self.settings.scheduler_config(),
        )
    }
}

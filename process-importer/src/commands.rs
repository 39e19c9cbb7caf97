//! The operations behind each CLI command.

use std::future::Future;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

use crate::ImporterError;
use process_importer_pipeline::{ImportRegistry, StopReport};
use process_importer_repository::CursorStore;
use process_importer_shared::{ImportPair, PartitionId, RecordType};
use process_importer_upgrade::{StepOutcome, UpgradeExecutor, UpgradeReport};

/// How often a running import logs the progress of its pairs.
pub const PROGRESS_LOG_INTERVAL: Duration = Duration::from_secs(60);

/// Parse the pair addressed by `reset-cursor`.
pub fn parse_pair(partition: u32, record_type: &str) -> Result<ImportPair, ImporterError> {
    let record_type: RecordType = record_type.parse().map_err(|_| {
        let known: Vec<&str> = RecordType::ALL.iter().map(|t| t.as_str()).collect();
        ImporterError::config(format!(
            "Unknown record type {}, expected one of {}",
            record_type,
            known.join(", ")
        ))
    })?;
    Ok(ImportPair::new(PartitionId(partition), record_type))
}

/// Bootstrap the indices and run every pending upgrade plan.
pub async fn upgrade(executor: &UpgradeExecutor) -> Result<UpgradeReport, ImporterError> {
    let report = executor.run().await?;

    let executed = report
        .steps
        .iter()
        .filter(|step| matches!(step.outcome, StepOutcome::Executed { .. }))
        .count();
    info!(
        bootstrap = ?report.bootstrap,
        installed_before = ?report.installed_before.map(|v| v.to_string()),
        installed_after = %report.installed_after,
        steps = report.steps.len(),
        executed = executed,
        "Upgrade finished"
    );
    Ok(report)
}

/// Reset a pair's cursor so its next cycle starts before the first record.
#[instrument(skip(cursors), fields(partition_id = %pair.partition_id, record_type = %pair.record_type))]
pub async fn reset_cursor(cursors: &dyn CursorStore, pair: ImportPair) -> Result<(), ImporterError> {
    cursors.reset_cursor(pair).await?;
    info!("Cursor reset");
    Ok(())
}

/// Import every pair until `shutdown` resolves.
///
/// Refuses to start unless the indices are at the current schema version.
/// Once `shutdown` resolves, pairs get `shutdown_timeout` to finish their
/// cycle before they are aborted.
pub async fn import<F>(
    executor: &UpgradeExecutor,
    registry: &ImportRegistry,
    pairs: Vec<ImportPair>,
    shutdown: F,
    shutdown_timeout: Duration,
) -> Result<StopReport, ImporterError>
where
    F: Future<Output = ()>,
{
    executor.ensure_current().await?;

    let running = registry.start(pairs);
    let mut progress_log = tokio::time::interval(PROGRESS_LOG_INTERVAL);
    progress_log.tick().await;
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Received shutdown signal");
                break;
            }
            _ = progress_log.tick() => {
                for progress in running.all_progress() {
                    if progress.consecutive_failures > 0 {
                        warn!(
                            pair = %progress.pair,
                            state = %progress.state,
                            consecutive_failures = progress.consecutive_failures,
                            last_error = progress.last_error.as_deref().unwrap_or(""),
                            "Import pair is failing"
                        );
                    } else {
                        info!(
                            pair = %progress.pair,
                            state = %progress.state,
                            last_committed = ?progress.last_committed.map(|p| p.value()),
                            imported_records = progress.imported_records,
                            "Import progress"
                        );
                    }
                }
            }
        }
    }

    let report = running.stop(shutdown_timeout).await;
    if report.aborted.is_empty() {
        info!(stopped = report.stopped.len(), "All import pairs stopped");
    } else {
        error!(
            stopped = report.stopped.len(),
            aborted = report.aborted.len(),
            "Import pairs aborted after the shutdown timeout"
        );
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use process_importer_pipeline::{
        BatchWriter, RecordFetcher, RecordTransformer, SchedulerConfig,
    };
    use process_importer_repository::{
        IndexNames, InMemoryIndex, InMemoryRecordSource, UpgradeMarkerStore,
    };
    use process_importer_shared::{ImportCursor, Position};
    use process_importer_upgrade::{UpgradeError, CURRENT_VERSION};
    use std::sync::Arc;

    fn executor(index: &Arc<InMemoryIndex>) -> UpgradeExecutor {
        UpgradeExecutor::new(index.clone(), index.clone(), IndexNames::default())
    }

    fn registry(index: &Arc<InMemoryIndex>) -> ImportRegistry {
        ImportRegistry::new(
            Arc::new(RecordFetcher::new(Arc::new(InMemoryRecordSource::new()))),
            Arc::new(RecordTransformer::new()),
            Arc::new(BatchWriter::new(index.clone())),
            index.clone(),
            SchedulerConfig::default(),
        )
    }

    #[test]
    fn test_parse_pair() {
        let pair = parse_pair(2, "incident").unwrap();
        assert_eq!(pair, ImportPair::new(PartitionId(2), RecordType::Incident));

        let err = parse_pair(0, "job").unwrap_err();
        assert!(err.to_string().contains("process-definition, process-instance"));
    }

    #[tokio::test]
    async fn test_import_requires_current_schema() {
        let index = Arc::new(InMemoryIndex::new());

        let result = import(
            &executor(&index),
            &registry(&index),
            ImportPair::all(1),
            async {},
            Duration::from_secs(1),
        )
        .await;

        assert!(matches!(
            result,
            Err(ImporterError::UpgradeError(UpgradeError::SchemaNotCurrent { .. }))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_import_stops_every_pair_on_shutdown() {
        let index = Arc::new(InMemoryIndex::new());
        let executor = executor(&index);
        upgrade(&executor).await.unwrap();
        assert_eq!(index.installed_version().await.unwrap(), Some(CURRENT_VERSION));

        let report = import(
            &executor,
            &registry(&index),
            ImportPair::all(2),
            tokio::time::sleep(Duration::from_millis(2500)),
            Duration::from_secs(5),
        )
        .await
        .unwrap();

        assert_eq!(report.stopped.len(), 8);
        assert!(report.aborted.is_empty());
    }

    #[tokio::test]
    async fn test_reset_cursor() {
        let index = Arc::new(InMemoryIndex::new());
        let pair = ImportPair::new(PartitionId(0), RecordType::Variable);
        index
            .store_cursor(&ImportCursor::initial(pair).advanced_to(Position(42)))
            .await
            .unwrap();

        reset_cursor(index.as_ref(), pair).await.unwrap();

        assert_eq!(
            index.load_cursor(pair).await.unwrap().last_processed_position,
            Position::BEFORE_FIRST
        );
    }
}

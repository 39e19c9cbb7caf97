//! Registry of running import pairs.

use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::{ImportProgress, ImportScheduler, SchedulerConfig};
use crate::fetcher::RecordFetcher;
use crate::transformer::RecordTransformer;
use crate::writer::BatchWriter;
use process_importer_repository::CursorStore;
use process_importer_shared::ImportPair;

/// Starts one scheduler task per import pair.
///
/// All pairs share the fetcher, transformer, writer and cursor store; they
/// share no mutable state besides the index itself.
pub struct ImportRegistry {
    fetcher: Arc<RecordFetcher>,
    transformer: Arc<RecordTransformer>,
    writer: Arc<BatchWriter>,
    cursors: Arc<dyn CursorStore>,
    config: SchedulerConfig,
}

impl ImportRegistry {
    pub fn new(
        fetcher: Arc<RecordFetcher>,
        transformer: Arc<RecordTransformer>,
        writer: Arc<BatchWriter>,
        cursors: Arc<dyn CursorStore>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            fetcher,
            transformer,
            writer,
            cursors,
            config,
        }
    }

    /// Spawn a scheduler task for every pair.
    ///
    /// Duplicate pairs are started once.
    pub fn start(&self, pairs: Vec<ImportPair>) -> RunningImport {
        let (shutdown_tx, _) = broadcast::channel(1);
        let mut tasks = BTreeMap::new();

        for pair in pairs {
            if tasks.contains_key(&pair) {
                continue;
            }

            let scheduler = ImportScheduler::new(
                pair,
                self.fetcher.clone(),
                self.transformer.clone(),
                self.writer.clone(),
                self.cursors.clone(),
                self.config.clone(),
            );
            let progress = scheduler.subscribe();
            let handle = tokio::spawn(scheduler.run(shutdown_tx.subscribe()));
            tasks.insert(pair, PairTask { handle, progress });
        }

        info!(pairs = tasks.len(), "Started import pairs");
        RunningImport { shutdown_tx, tasks }
    }
}

struct PairTask {
    handle: JoinHandle<()>,
    progress: watch::Receiver<ImportProgress>,
}

/// Outcome of stopping a running import.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StopReport {
    /// Pairs that finished their cycle and stopped on their own.
    pub stopped: Vec<ImportPair>,
    /// Pairs aborted after the timeout.
    pub aborted: Vec<ImportPair>,
}

/// Handle to the scheduler tasks of a started import.
pub struct RunningImport {
    shutdown_tx: broadcast::Sender<()>,
    tasks: BTreeMap<ImportPair, PairTask>,
}

impl RunningImport {
    pub fn pairs(&self) -> Vec<ImportPair> {
        self.tasks.keys().copied().collect()
    }

    /// Latest progress snapshot of a pair.
    pub fn progress(&self, pair: ImportPair) -> Option<ImportProgress> {
        self.tasks.get(&pair).map(|task| task.progress.borrow().clone())
    }

    /// Latest progress snapshot of every pair, in pair order.
    pub fn all_progress(&self) -> Vec<ImportProgress> {
        self.tasks
            .values()
            .map(|task| task.progress.borrow().clone())
            .collect()
    }

    /// Signal shutdown and wait up to `timeout` for every pair to stop.
    ///
    /// Pairs finish their in-flight cycle before stopping. Pairs still
    /// running after the timeout are aborted; a cursor write is a single
    /// document, so an aborted pair resumes from its last committed cursor.
    pub async fn stop(self, timeout: Duration) -> StopReport {
        info!(pairs = self.tasks.len(), "Stopping import pairs");
        let _ = self.shutdown_tx.send(());

        let mut pairs = Vec::with_capacity(self.tasks.len());
        let mut abort_handles = Vec::with_capacity(self.tasks.len());
        let mut handles = Vec::with_capacity(self.tasks.len());
        for (pair, task) in self.tasks {
            pairs.push(pair);
            abort_handles.push(task.handle.abort_handle());
            handles.push(task.handle);
        }

        let mut report = StopReport::default();
        match tokio::time::timeout(timeout, join_all(handles)).await {
            Ok(_) => report.stopped = pairs,
            Err(_) => {
                for (pair, abort_handle) in pairs.into_iter().zip(abort_handles) {
                    if abort_handle.is_finished() {
                        report.stopped.push(pair);
                    } else {
                        abort_handle.abort();
                        report.aborted.push(pair);
                    }
                }
                warn!(aborted = report.aborted.len(), "Aborted import pairs after shutdown timeout");
            }
        }

        info!(
            stopped = report.stopped.len(),
            aborted = report.aborted.len(),
            "Import stopped"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::PairState;
    use process_importer_repository::{InMemoryIndex, InMemoryRecordSource};
    use process_importer_shared::{PartitionId, RecordType};

    fn registry(index: Arc<InMemoryIndex>) -> ImportRegistry {
        let source = Arc::new(InMemoryRecordSource::new());
        ImportRegistry::new(
            Arc::new(RecordFetcher::new(source)),
            Arc::new(RecordTransformer::new()),
            Arc::new(BatchWriter::new(index.clone())),
            index,
            SchedulerConfig {
                poll_interval_ms: 50,
                ..SchedulerConfig::default()
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_and_stop_all_pairs() {
        let index = Arc::new(InMemoryIndex::new());
        let running = registry(index).start(ImportPair::all(2));
        assert_eq!(running.pairs().len(), 8);

        tokio::time::sleep(Duration::from_millis(120)).await;
        let pair = ImportPair::new(PartitionId(1), RecordType::Variable);
        assert!(running.progress(pair).is_some());

        let report = running.stop(Duration::from_secs(1)).await;
        assert_eq!(report.stopped.len(), 8);
        assert!(report.aborted.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_pairs_start_once() {
        let index = Arc::new(InMemoryIndex::new());
        let pair = ImportPair::new(PartitionId(0), RecordType::Incident);
        let running = registry(index).start(vec![pair, pair]);

        assert_eq!(running.pairs(), vec![pair]);
        assert_eq!(running.all_progress()[0].pair, pair);

        let report = running.stop(Duration::from_secs(1)).await;
        assert_eq!(report.stopped, vec![pair]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopped_pairs_report_stopped_state() {
        let index = Arc::new(InMemoryIndex::new());
        let pair = ImportPair::new(PartitionId(0), RecordType::ProcessInstance);
        let running = registry(index).start(vec![pair]);
        tokio::time::sleep(Duration::from_millis(10)).await;

        let progress = running.tasks[&pair].progress.clone();
        running.stop(Duration::from_secs(1)).await;
        assert_eq!(progress.borrow().state, PairState::Stopped);
    }
}

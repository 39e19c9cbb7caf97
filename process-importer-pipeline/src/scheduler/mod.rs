//! Import scheduler for the import pipeline.
//!
//! One scheduler drives one import pair through the cycle
//! `Idle → Fetching → Transforming → Writing → Committing → Idle`, backing
//! off on empty pages and errors. Pairs are independent; the registry runs
//! one scheduler task per pair.

mod registry;

pub use registry::{ImportRegistry, RunningImport, StopReport};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, instrument, warn};

use crate::errors::ImportError;
use crate::fetcher::RecordFetcher;
use crate::transformer::RecordTransformer;
use crate::writer::BatchWriter;
use process_importer_repository::CursorStore;
use process_importer_shared::{ImportPage, ImportPair, Position};

/// Configuration for import schedulers.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Records requested per page.
    pub batch_size: usize,
    /// Wait after an empty or short page (in milliseconds).
    pub poll_interval_ms: u64,
    /// First delay after a failed cycle (in milliseconds).
    pub initial_backoff_ms: u64,
    /// Upper bound on the delay after repeated failures (in milliseconds).
    pub max_backoff_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            batch_size: 500,
            poll_interval_ms: 1000,
            initial_backoff_ms: 1000,
            max_backoff_ms: 30000,
        }
    }
}

/// Where a pair is in its import cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairState {
    Idle,
    Fetching,
    Transforming,
    Writing,
    Committing,
    Backoff,
    Stopped,
}

impl fmt::Display for PairState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PairState::Idle => "idle",
            PairState::Fetching => "fetching",
            PairState::Transforming => "transforming",
            PairState::Writing => "writing",
            PairState::Committing => "committing",
            PairState::Backoff => "backoff",
            PairState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Snapshot of one pair's import progress.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportProgress {
    pub pair: ImportPair,
    pub state: PairState,
    /// Last position committed by this run, `None` before the first commit.
    pub last_committed: Option<Position>,
    /// Records imported by this run.
    pub imported_records: u64,
    /// Failed cycles since the last successful one.
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
}

impl ImportProgress {
    fn new(pair: ImportPair) -> Self {
        Self {
            pair,
            state: PairState::Idle,
            last_committed: None,
            imported_records: 0,
            consecutive_failures: 0,
            last_error: None,
        }
    }
}

/// Result of one successful import cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Nothing new after the cursor.
    Empty,
    /// The source returned fewer records than requested.
    Partial { count: usize, committed: Position },
    /// The source filled the page; more records are likely waiting.
    Full { count: usize, committed: Position },
}

/// Scheduler that imports one pair.
pub struct ImportScheduler {
    pair: ImportPair,
    fetcher: Arc<RecordFetcher>,
    transformer: Arc<RecordTransformer>,
    writer: Arc<BatchWriter>,
    cursors: Arc<dyn CursorStore>,
    config: SchedulerConfig,
    progress: watch::Sender<ImportProgress>,
}

impl ImportScheduler {
    /// Create a new scheduler for the pair.
    pub fn new(
        pair: ImportPair,
        fetcher: Arc<RecordFetcher>,
        transformer: Arc<RecordTransformer>,
        writer: Arc<BatchWriter>,
        cursors: Arc<dyn CursorStore>,
        config: SchedulerConfig,
    ) -> Self {
        let (progress, _) = watch::channel(ImportProgress::new(pair));

        Self {
            pair,
            fetcher,
            transformer,
            writer,
            cursors,
            config,
            progress,
        }
    }

    pub fn pair(&self) -> ImportPair {
        self.pair
    }

    /// Subscribe to progress snapshots of this scheduler.
    pub fn subscribe(&self) -> watch::Receiver<ImportProgress> {
        self.progress.subscribe()
    }

    /// The current progress snapshot.
    pub fn progress(&self) -> ImportProgress {
        self.progress.borrow().clone()
    }

    fn set_state(&self, state: PairState) {
        self.progress.send_modify(|progress| progress.state = state);
    }

    /// Run one import cycle.
    ///
    /// The cursor advances only after every mutation of the page was
    /// written. On any error the cursor is left as is and the next cycle
    /// retries the same page.
    #[instrument(skip(self), fields(partition_id = %self.pair.partition_id, record_type = %self.pair.record_type))]
    pub async fn run_cycle(&self) -> Result<CycleOutcome, ImportError> {
        self.set_state(PairState::Fetching);
        let cursor = self
            .cursors
            .load_cursor(self.pair)
            .await
            .map_err(|e| ImportError::cursor(self.pair, e))?;

        let page = ImportPage::after(&cursor, self.config.batch_size);
        let fetched = self.fetcher.fetch(&page).await?;
        let records = &fetched.records;

        let Some(last) = records.last().map(|record| record.position) else {
            return Ok(CycleOutcome::Empty);
        };

        self.set_state(PairState::Transforming);
        let mutations = self.transformer.transform_page(records);
        debug!(
            records = records.len(),
            mutations = mutations.len(),
            "Transformed page"
        );

        self.set_state(PairState::Writing);
        let result = self.writer.apply(&mutations).await?;
        if let Some((first, failure)) = result.first_failure() {
            return Err(ImportError::IncompleteBatch {
                total: mutations.len(),
                failed: result.failed.len(),
                permanent: result
                    .failed
                    .values()
                    .filter(|failure| !failure.is_transient())
                    .count(),
                first: first.clone(),
                reason: failure.reason().to_string(),
            });
        }

        self.set_state(PairState::Committing);
        if last <= cursor.last_processed_position {
            return Err(ImportError::CursorRegression {
                pair: self.pair,
                stored: cursor.last_processed_position,
                attempted: last,
            });
        }

        self.cursors
            .store_cursor(&cursor.advanced_to(last))
            .await
            .map_err(|e| ImportError::cursor(self.pair, e))?;

        let count = records.len();
        self.progress.send_modify(|progress| {
            progress.last_committed = Some(last);
            progress.imported_records += count as u64;
        });

        info!(
            count = count,
            position = %last,
            imported = self.progress.borrow().imported_records,
            "Committed import cursor"
        );

        if fetched.is_full() {
            Ok(CycleOutcome::Full {
                count,
                committed: last,
            })
        } else {
            Ok(CycleOutcome::Partial {
                count,
                committed: last,
            })
        }
    }

    /// Run import cycles until shutdown is signalled.
    ///
    /// The shutdown signal is observed between cycles and during waits; a
    /// cycle in flight always finishes first. Failed cycles are retried
    /// forever with exponential backoff.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        info!(pair = %self.pair, "Starting import scheduler");
        let mut backoff_ms = self.config.initial_backoff_ms;

        loop {
            if !matches!(
                shutdown.try_recv(),
                Err(broadcast::error::TryRecvError::Empty)
            ) {
                break;
            }

            let wait_ms = match self.run_cycle().await {
                Ok(outcome) => {
                    backoff_ms = self.config.initial_backoff_ms;
                    self.progress.send_modify(|progress| {
                        progress.consecutive_failures = 0;
                        progress.last_error = None;
                    });
                    match outcome {
                        CycleOutcome::Full { .. } => None,
                        CycleOutcome::Partial { .. } | CycleOutcome::Empty => {
                            Some(self.config.poll_interval_ms)
                        }
                    }
                }
                Err(e) => {
                    let failures = self.progress.borrow().consecutive_failures + 1;
                    if e.is_transient() {
                        warn!(
                            pair = %self.pair,
                            error = %e,
                            failures = failures,
                            retry_in_ms = backoff_ms,
                            "Import cycle failed"
                        );
                    } else {
                        error!(
                            pair = %self.pair,
                            error = %e,
                            failures = failures,
                            retry_in_ms = backoff_ms,
                            "Import cycle failed, pair is blocked"
                        );
                    }
                    self.progress.send_modify(|progress| {
                        progress.consecutive_failures = failures;
                        progress.last_error = Some(e.to_string());
                    });

                    let wait = backoff_ms;
                    backoff_ms =
                        std::cmp::min(backoff_ms.saturating_mul(2), self.config.max_backoff_ms);
                    Some(wait)
                }
            };

            if let Some(wait_ms) = wait_ms {
                self.set_state(PairState::Backoff);
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_millis(wait_ms)) => {}
                    _ = shutdown.recv() => break,
                }
            }

            self.set_state(PairState::Idle);
        }

        self.set_state(PairState::Stopped);
        info!(pair = %self.pair, "Import scheduler stopped");
    }
}

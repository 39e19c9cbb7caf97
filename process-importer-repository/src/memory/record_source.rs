//! In-memory engine log.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::errors::StoreError;
use crate::interfaces::RecordSource;
use process_importer_shared::{PartitionId, Position, RawRecord, RecordType};

#[derive(Debug, Default)]
struct State {
    logs: HashMap<(PartitionId, RecordType), Vec<Value>>,
    read_errors: VecDeque<StoreError>,
    reads: usize,
}

/// An engine log held in memory.
///
/// Records are kept in append order and served as the exporter would serve
/// them. Appending out of order or appending malformed JSON is allowed, so
/// tests can exercise the fetcher's validation.
#[derive(Debug, Default)]
pub struct InMemoryRecordSource {
    state: Mutex<State>,
}

impl InMemoryRecordSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a record to its partition's log.
    pub fn push(&self, record: &RawRecord) {
        self.push_raw(record.partition_id, record.record_type, record.to_exported());
    }

    /// Append exported JSON to a partition's log as is.
    pub fn push_raw(&self, partition_id: PartitionId, record_type: RecordType, record: Value) {
        self.state()
            .logs
            .entry((partition_id, record_type))
            .or_default()
            .push(record);
    }

    /// Make the next read fail.
    pub fn fail_next_read(&self, error: StoreError) {
        self.state().read_errors.push_back(error);
    }

    /// Number of reads served, including failed ones.
    pub fn read_count(&self) -> usize {
        self.state().reads
    }
}

#[async_trait]
impl RecordSource for InMemoryRecordSource {
    async fn read_records(
        &self,
        partition_id: PartitionId,
        record_type: RecordType,
        after: Position,
        max_count: usize,
    ) -> Result<Vec<Value>, StoreError> {
        let mut state = self.state();
        state.reads += 1;

        if let Some(error) = state.read_errors.pop_front() {
            return Err(error);
        }

        let records = state
            .logs
            .get(&(partition_id, record_type))
            .map(|log| {
                log.iter()
                    .filter(|record| {
                        // Records without a readable position are served so
                        // the caller sees them.
                        record["position"]
                            .as_i64()
                            .map_or(true, |position| position > after.value())
                    })
                    .take(max_count)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_reads_strictly_after_position() {
        let source = InMemoryRecordSource::new();
        for position in 1..=5 {
            source.push_raw(
                PartitionId(0),
                RecordType::Incident,
                json!({ "position": position }),
            );
        }

        let records = source
            .read_records(PartitionId(0), RecordType::Incident, Position(2), 2)
            .await
            .unwrap();

        assert_eq!(records, vec![json!({ "position": 3 }), json!({ "position": 4 })]);
    }

    #[tokio::test]
    async fn test_partitions_are_independent() {
        let source = InMemoryRecordSource::new();
        source.push_raw(PartitionId(1), RecordType::Incident, json!({ "position": 1 }));

        let records = source
            .read_records(PartitionId(0), RecordType::Incident, Position::BEFORE_FIRST, 10)
            .await
            .unwrap();

        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_injected_read_failure() {
        let source = InMemoryRecordSource::new();
        source.fail_next_read(StoreError::connection("refused"));

        assert!(source
            .read_records(PartitionId(0), RecordType::Variable, Position::BEFORE_FIRST, 10)
            .await
            .is_err());
        assert_eq!(source.read_count(), 1);
    }
}

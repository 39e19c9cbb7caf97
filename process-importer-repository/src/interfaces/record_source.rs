//! Engine log transport trait definition.

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::StoreError;
use process_importer_shared::{PartitionId, Position, RecordType};

/// Paging read access to the engine's partitioned log.
///
/// Delivery is at-least-once and position-ordered within a partition. Records
/// are returned in their exported JSON form; decoding and validation are the
/// caller's job, so a malformed record never hides the rest of a page.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Read up to `max_count` records of one type from one partition whose
    /// position is strictly greater than `after`, ascending by position.
    ///
    /// # Returns
    ///
    /// * `Ok(records)` - Possibly empty
    /// * `Err(StoreError)` - If the log could not be read
    async fn read_records(
        &self,
        partition_id: PartitionId,
        record_type: RecordType,
        after: Position,
        max_count: usize,
    ) -> Result<Vec<Value>, StoreError>;
}

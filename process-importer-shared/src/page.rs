//! Import pages and cursors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ImportPair, PartitionId, Position, RecordType};

/// What to fetch next for one pair: up to `batch_size` records strictly after
/// `position`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportPage {
    pub partition_id: PartitionId,
    pub record_type: RecordType,
    pub position: Position,
    pub batch_size: usize,
}

impl ImportPage {
    /// The page following the given cursor.
    pub fn after(cursor: &ImportCursor, batch_size: usize) -> Self {
        Self {
            partition_id: cursor.partition_id,
            record_type: cursor.record_type,
            position: cursor.last_processed_position,
            batch_size,
        }
    }

    pub fn pair(&self) -> ImportPair {
        ImportPair::new(self.partition_id, self.record_type)
    }
}

/// The last position a pair has durably processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportCursor {
    pub partition_id: PartitionId,
    pub record_type: RecordType,
    pub last_processed_position: Position,
    /// When the cursor was last committed. Not part of cursor identity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

impl ImportCursor {
    /// A cursor that has processed nothing yet.
    pub fn initial(pair: ImportPair) -> Self {
        Self {
            partition_id: pair.partition_id,
            record_type: pair.record_type,
            last_processed_position: Position::BEFORE_FIRST,
            last_updated: None,
        }
    }

    /// The same cursor moved to `position`.
    pub fn advanced_to(&self, position: Position) -> Self {
        Self {
            partition_id: self.partition_id,
            record_type: self.record_type,
            last_processed_position: position,
            last_updated: Some(Utc::now()),
        }
    }

    pub fn pair(&self) -> ImportPair {
        ImportPair::new(self.partition_id, self.record_type)
    }
}

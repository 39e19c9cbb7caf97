//! Identifiers for the engine log: partitions, positions and record types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::DecodeError;

/// An engine-assigned shard of the event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartitionId(pub u32);

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A sequence number within one partition.
///
/// Positions produced by the engine are non-negative and strictly increasing
/// within a partition. They are never comparable across partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Position(pub i64);

impl Position {
    /// Sorts before every position the engine can produce.
    pub const BEFORE_FIRST: Position = Position(-1);

    /// The raw sequence number.
    pub fn value(self) -> i64 {
        self.0
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The kinds of engine records the importer consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecordType {
    /// Deployed process definitions.
    ProcessDefinition,
    /// Process instance element lifecycle.
    ProcessInstance,
    /// Incidents raised and resolved on instances.
    Incident,
    /// Process variables.
    Variable,
}

impl RecordType {
    /// Every record type, in import order.
    pub const ALL: [RecordType; 4] = [
        RecordType::ProcessDefinition,
        RecordType::ProcessInstance,
        RecordType::Incident,
        RecordType::Variable,
    ];

    /// Stable name used in cursor keys, logs and the CLI.
    pub fn as_str(self) -> &'static str {
        match self {
            RecordType::ProcessDefinition => "process-definition",
            RecordType::ProcessInstance => "process-instance",
            RecordType::Incident => "incident",
            RecordType::Variable => "variable",
        }
    }

    /// The `valueType` the engine exporter writes for this record type.
    pub fn value_type(self) -> &'static str {
        match self {
            RecordType::ProcessDefinition => "PROCESS",
            RecordType::ProcessInstance => "PROCESS_INSTANCE",
            RecordType::Incident => "INCIDENT",
            RecordType::Variable => "VARIABLE",
        }
    }

    /// Map an exporter `valueType` back to a record type.
    pub fn from_value_type(value_type: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|record_type| record_type.value_type() == value_type)
    }

    /// The segment of the exporter index name holding these records.
    pub fn exporter_segment(self) -> &'static str {
        match self {
            RecordType::ProcessDefinition => "process",
            RecordType::ProcessInstance => "process-instance",
            RecordType::Incident => "incident",
            RecordType::Variable => "variable",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordType {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|record_type| record_type.as_str() == s)
            .ok_or_else(|| DecodeError::UnknownRecordType(s.to_string()))
    }
}

/// A (partition, record type) pair: the unit of scheduling and cursor tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportPair {
    pub partition_id: PartitionId,
    pub record_type: RecordType,
}

impl ImportPair {
    pub fn new(partition_id: PartitionId, record_type: RecordType) -> Self {
        Self {
            partition_id,
            record_type,
        }
    }

    /// Every pair for partitions `0..partition_count`.
    pub fn all(partition_count: u32) -> Vec<ImportPair> {
        (0..partition_count)
            .flat_map(|partition| {
                RecordType::ALL
                    .into_iter()
                    .map(move |record_type| ImportPair::new(PartitionId(partition), record_type))
            })
            .collect()
    }

    /// Key of the persisted cursor document for this pair.
    ///
    /// Uses format: `{partition_id}-{record_type}`.
    pub fn cursor_id(&self) -> String {
        format!("{}-{}", self.partition_id, self.record_type)
    }
}

impl fmt::Display for ImportPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "partition {} / {}", self.partition_id, self.record_type)
    }
}

//! Raw engine records and their exported JSON form.
//!
//! The engine exporter writes one JSON object per record:
//!
//! ```json
//! {
//!   "partitionId": 1, "position": 42, "key": 2251799813685249,
//!   "recordType": "EVENT", "valueType": "PROCESS_INSTANCE",
//!   "intent": "ELEMENT_ACTIVATED", "timestamp": 1700000000000,
//!   "value": { ... }
//! }
//! ```
//!
//! The `value` object is decoded into a payload variant chosen by `valueType`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::errors::DecodeError;
use crate::ids::{PartitionId, Position, RecordType};

/// Tenant assigned to records written before multi-tenancy existed.
pub const DEFAULT_TENANT_ID: &str = "<default>";

fn default_tenant_id() -> String {
    DEFAULT_TENANT_ID.to_string()
}

fn no_key() -> i64 {
    -1
}

/// The state transition a record represents.
///
/// Unknown intents are kept verbatim in `Other` so newer engines can add
/// intents without breaking decoding.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Intent {
    Created,
    Updated,
    Deleted,
    Resolved,
    ElementActivating,
    ElementActivated,
    ElementCompleting,
    ElementCompleted,
    ElementTerminating,
    ElementTerminated,
    Other(String),
}

impl Intent {
    pub fn parse(intent: &str) -> Self {
        match intent {
            "CREATED" => Intent::Created,
            "UPDATED" => Intent::Updated,
            "DELETED" => Intent::Deleted,
            "RESOLVED" => Intent::Resolved,
            "ELEMENT_ACTIVATING" => Intent::ElementActivating,
            "ELEMENT_ACTIVATED" => Intent::ElementActivated,
            "ELEMENT_COMPLETING" => Intent::ElementCompleting,
            "ELEMENT_COMPLETED" => Intent::ElementCompleted,
            "ELEMENT_TERMINATING" => Intent::ElementTerminating,
            "ELEMENT_TERMINATED" => Intent::ElementTerminated,
            other => Intent::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Intent::Created => "CREATED",
            Intent::Updated => "UPDATED",
            Intent::Deleted => "DELETED",
            Intent::Resolved => "RESOLVED",
            Intent::ElementActivating => "ELEMENT_ACTIVATING",
            Intent::ElementActivated => "ELEMENT_ACTIVATED",
            Intent::ElementCompleting => "ELEMENT_COMPLETING",
            Intent::ElementCompleted => "ELEMENT_COMPLETED",
            Intent::ElementTerminating => "ELEMENT_TERMINATING",
            Intent::ElementTerminated => "ELEMENT_TERMINATED",
            Intent::Other(other) => other,
        }
    }
}

/// Value of a process definition deployment record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessDefinitionValue {
    pub process_definition_key: i64,
    pub bpmn_process_id: String,
    pub version: i32,
    #[serde(default)]
    pub resource_name: String,
    #[serde(default = "default_tenant_id")]
    pub tenant_id: String,
}

/// Value of a process instance element record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessInstanceValue {
    pub process_instance_key: i64,
    pub process_definition_key: i64,
    pub bpmn_process_id: String,
    pub version: i32,
    pub element_id: String,
    pub bpmn_element_type: String,
    #[serde(default = "no_key")]
    pub parent_process_instance_key: i64,
    #[serde(default = "default_tenant_id")]
    pub tenant_id: String,
}

impl ProcessInstanceValue {
    /// Whether the record describes the process element itself rather than
    /// an activity inside it.
    pub fn is_process_element(&self) -> bool {
        self.bpmn_element_type == "PROCESS"
    }
}

/// Value of an incident record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentValue {
    pub process_instance_key: i64,
    pub process_definition_key: i64,
    pub bpmn_process_id: String,
    pub element_id: String,
    pub element_instance_key: i64,
    pub error_type: String,
    #[serde(default)]
    pub error_message: String,
    #[serde(default = "default_tenant_id")]
    pub tenant_id: String,
}

/// Value of a variable record. `value` holds the JSON-encoded variable value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableValue {
    pub name: String,
    pub value: String,
    pub scope_key: i64,
    pub process_instance_key: i64,
    pub process_definition_key: i64,
    pub bpmn_process_id: String,
    #[serde(default = "default_tenant_id")]
    pub tenant_id: String,
}

/// Record payload, tagged by record type.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordPayload {
    ProcessDefinition(ProcessDefinitionValue),
    ProcessInstance(ProcessInstanceValue),
    Incident(IncidentValue),
    Variable(VariableValue),
}

impl RecordPayload {
    pub fn record_type(&self) -> RecordType {
        match self {
            RecordPayload::ProcessDefinition(_) => RecordType::ProcessDefinition,
            RecordPayload::ProcessInstance(_) => RecordType::ProcessInstance,
            RecordPayload::Incident(_) => RecordType::Incident,
            RecordPayload::Variable(_) => RecordType::Variable,
        }
    }

    fn decode(record_type: RecordType, value: Value) -> Result<Self, serde_json::Error> {
        Ok(match record_type {
            RecordType::ProcessDefinition => {
                RecordPayload::ProcessDefinition(serde_json::from_value(value)?)
            }
            RecordType::ProcessInstance => {
                RecordPayload::ProcessInstance(serde_json::from_value(value)?)
            }
            RecordType::Incident => RecordPayload::Incident(serde_json::from_value(value)?),
            RecordType::Variable => RecordPayload::Variable(serde_json::from_value(value)?),
        })
    }

    fn encode(&self) -> Value {
        let encoded = match self {
            RecordPayload::ProcessDefinition(value) => serde_json::to_value(value),
            RecordPayload::ProcessInstance(value) => serde_json::to_value(value),
            RecordPayload::Incident(value) => serde_json::to_value(value),
            RecordPayload::Variable(value) => serde_json::to_value(value),
        };
        // Plain structs of strings and integers always serialize.
        encoded.unwrap_or(Value::Null)
    }
}

/// One event read from the engine log.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub partition_id: PartitionId,
    pub position: Position,
    /// Engine key of the entity the record is about.
    pub key: i64,
    pub record_type: RecordType,
    pub intent: Intent,
    pub timestamp: DateTime<Utc>,
    pub payload: RecordPayload,
}

/// Shape of a record as written by the engine exporter.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExportedRecord {
    partition_id: u32,
    position: i64,
    #[serde(default = "no_key")]
    key: i64,
    value_type: String,
    intent: String,
    timestamp: i64,
    value: Value,
}

impl RawRecord {
    /// Decode a record from the exporter's JSON form.
    pub fn from_exported(source: Value) -> Result<Self, DecodeError> {
        let exported: ExportedRecord = serde_json::from_value(source)
            .map_err(|e| DecodeError::malformed(format!("invalid record envelope: {}", e)))?;

        let record_type = RecordType::from_value_type(&exported.value_type)
            .ok_or_else(|| DecodeError::UnknownValueType(exported.value_type.clone()))?;

        let timestamp = DateTime::from_timestamp_millis(exported.timestamp)
            .ok_or(DecodeError::InvalidTimestamp(exported.timestamp))?;

        let payload = RecordPayload::decode(record_type, exported.value).map_err(|e| {
            DecodeError::malformed(format!(
                "invalid {} value at position {}: {}",
                record_type, exported.position, e
            ))
        })?;

        Ok(Self {
            partition_id: PartitionId(exported.partition_id),
            position: Position(exported.position),
            key: exported.key,
            record_type,
            intent: Intent::parse(&exported.intent),
            timestamp,
            payload,
        })
    }

    /// Encode the record in the exporter's JSON form.
    pub fn to_exported(&self) -> Value {
        json!({
            "partitionId": self.partition_id.0,
            "position": self.position.0,
            "key": self.key,
            "recordType": "EVENT",
            "valueType": self.record_type.value_type(),
            "intent": self.intent.as_str(),
            "timestamp": self.timestamp.timestamp_millis(),
            "value": self.payload.encode(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exported_instance() -> Value {
        json!({
            "partitionId": 1,
            "position": 42,
            "key": 2251799813685250_i64,
            "recordType": "EVENT",
            "valueType": "PROCESS_INSTANCE",
            "intent": "ELEMENT_ACTIVATED",
            "timestamp": 1700000000000_i64,
            "value": {
                "processInstanceKey": 2251799813685250_i64,
                "processDefinitionKey": 2251799813685249_i64,
                "bpmnProcessId": "order-process",
                "version": 3,
                "elementId": "order-process",
                "bpmnElementType": "PROCESS",
                "flowScopeKey": -1
            }
        })
    }

    #[test]
    fn test_decode_process_instance_record() {
        let record = RawRecord::from_exported(exported_instance()).unwrap();

        assert_eq!(record.partition_id, PartitionId(1));
        assert_eq!(record.position, Position(42));
        assert_eq!(record.record_type, RecordType::ProcessInstance);
        assert_eq!(record.intent, Intent::ElementActivated);
        assert_eq!(record.timestamp.timestamp_millis(), 1700000000000);

        match record.payload {
            RecordPayload::ProcessInstance(value) => {
                assert_eq!(value.bpmn_process_id, "order-process");
                assert_eq!(value.tenant_id, DEFAULT_TENANT_ID);
                assert_eq!(value.parent_process_instance_key, -1);
                assert!(value.is_process_element());
            }
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_intent_is_preserved() {
        let mut source = exported_instance();
        source["intent"] = json!("ELEMENT_MIGRATED");

        let record = RawRecord::from_exported(source).unwrap();
        assert_eq!(record.intent, Intent::Other("ELEMENT_MIGRATED".to_string()));
        assert_eq!(record.intent.as_str(), "ELEMENT_MIGRATED");
    }

    #[test]
    fn test_unknown_value_type() {
        let mut source = exported_instance();
        source["valueType"] = json!("JOB");

        assert_eq!(
            RawRecord::from_exported(source),
            Err(DecodeError::UnknownValueType("JOB".to_string()))
        );
    }

    #[test]
    fn test_malformed_value() {
        let mut source = exported_instance();
        source["value"] = json!({ "processInstanceKey": "not-a-number" });

        assert!(matches!(
            RawRecord::from_exported(source),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn test_missing_position() {
        let mut source = exported_instance();
        source.as_object_mut().unwrap().remove("position");

        assert!(matches!(
            RawRecord::from_exported(source),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn test_exported_form_decodes_to_same_record() {
        let record = RawRecord::from_exported(exported_instance()).unwrap();
        let again = RawRecord::from_exported(record.to_exported()).unwrap();
        assert_eq!(record, again);
    }
}

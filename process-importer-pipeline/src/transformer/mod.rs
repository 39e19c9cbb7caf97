//! Record transformer for the import pipeline.
//!
//! Turns engine records into document mutations. The transformer is a lookup
//! table from `(record type, intent)` to a pure mapping function; records
//! without an entry produce no mutations.

use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::HashMap;

use process_importer_shared::{
    DocumentIndex, DocumentMutation, IncidentValue, Intent, MutationOperation,
    ProcessDefinitionValue, ProcessInstanceValue, RawRecord, RecordPayload, RecordType,
    VariableValue,
};

/// Maps one record to the mutations it causes.
type MappingFn = fn(&RawRecord) -> Vec<DocumentMutation>;

/// Render a record timestamp the way every document index stores dates.
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Transformer from engine records to document mutations.
///
/// Deterministic: the same record always yields byte-identical mutations.
/// Dates come from the record timestamp, never from the wall clock.
pub struct RecordTransformer {
    mappings: HashMap<(RecordType, Intent), MappingFn>,
}

impl Default for RecordTransformer {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordTransformer {
    /// Create a transformer with the standard mapping table.
    pub fn new() -> Self {
        let entries: [(RecordType, Intent, MappingFn); 9] = [
            (RecordType::ProcessDefinition, Intent::Created, definition_deployed),
            (RecordType::ProcessDefinition, Intent::Deleted, definition_deleted),
            (RecordType::ProcessInstance, Intent::ElementActivated, instance_started),
            (RecordType::ProcessInstance, Intent::ElementCompleted, instance_completed),
            (RecordType::ProcessInstance, Intent::ElementTerminated, instance_canceled),
            (RecordType::Incident, Intent::Created, incident_created),
            (RecordType::Incident, Intent::Resolved, incident_resolved),
            (RecordType::Variable, Intent::Created, variable_changed),
            (RecordType::Variable, Intent::Updated, variable_changed),
        ];

        let mappings = entries
            .into_iter()
            .map(|(record_type, intent, mapping)| ((record_type, intent), mapping))
            .collect();

        Self { mappings }
    }

    /// Transform one record into zero or more mutations.
    ///
    /// Every mutation carries the partition and position of its record.
    pub fn transform(&self, record: &RawRecord) -> Vec<DocumentMutation> {
        let Some(mapping) = self.mappings.get(&(record.record_type, record.intent.clone())) else {
            return Vec::new();
        };

        mapping(record)
            .into_iter()
            .map(|mutation| match mutation.operation {
                MutationOperation::Delete => mutation,
                _ => mutation
                    .with_field("partitionId", record.partition_id.0)
                    .with_field("position", record.position.value()),
            })
            .collect()
    }

    /// Transform a page of records, keeping position order.
    pub fn transform_page(&self, records: &[RawRecord]) -> Vec<DocumentMutation> {
        records.iter().flat_map(|record| self.transform(record)).collect()
    }

    /// Whether the table has an entry for the tag.
    pub fn supports(&self, record_type: RecordType, intent: &Intent) -> bool {
        self.mappings.contains_key(&(record_type, intent.clone()))
    }
}

fn definition_value(record: &RawRecord) -> Option<&ProcessDefinitionValue> {
    match &record.payload {
        RecordPayload::ProcessDefinition(value) => Some(value),
        _ => None,
    }
}

/// Instance records about the process element itself. Activities inside the
/// process are not imported.
fn process_element_value(record: &RawRecord) -> Option<&ProcessInstanceValue> {
    match &record.payload {
        RecordPayload::ProcessInstance(value) if value.is_process_element() => Some(value),
        _ => None,
    }
}

fn incident_value(record: &RawRecord) -> Option<&IncidentValue> {
    match &record.payload {
        RecordPayload::Incident(value) => Some(value),
        _ => None,
    }
}

fn variable_value(record: &RawRecord) -> Option<&VariableValue> {
    match &record.payload {
        RecordPayload::Variable(value) => Some(value),
        _ => None,
    }
}

fn definition_deployed(record: &RawRecord) -> Vec<DocumentMutation> {
    let Some(value) = definition_value(record) else {
        return Vec::new();
    };

    vec![DocumentMutation::upsert(
        DocumentIndex::ProcessDefinition,
        value.process_definition_key.to_string(),
    )
    .with_field("processDefinitionKey", value.process_definition_key)
    .with_field("bpmnProcessId", value.bpmn_process_id.as_str())
    .with_field("version", value.version)
    .with_field("resourceName", value.resource_name.as_str())
    .with_field("tenantId", value.tenant_id.as_str())
    .with_field("deploymentDate", format_timestamp(&record.timestamp))]
}

fn definition_deleted(record: &RawRecord) -> Vec<DocumentMutation> {
    definition_value(record)
        .map(|value| {
            DocumentMutation::delete(
                DocumentIndex::ProcessDefinition,
                value.process_definition_key.to_string(),
            )
        })
        .into_iter()
        .collect()
}

/// Fields identifying an instance, repeated on every instance mutation so a
/// document always carries them whichever record created it.
fn instance_upsert(value: &ProcessInstanceValue) -> DocumentMutation {
    DocumentMutation::upsert(
        DocumentIndex::ProcessInstance,
        value.process_instance_key.to_string(),
    )
    .with_field("processInstanceKey", value.process_instance_key)
    .with_field("processDefinitionKey", value.process_definition_key)
    .with_field("bpmnProcessId", value.bpmn_process_id.as_str())
    .with_field("tenantId", value.tenant_id.as_str())
}

fn instance_started(record: &RawRecord) -> Vec<DocumentMutation> {
    let Some(value) = process_element_value(record) else {
        return Vec::new();
    };

    vec![instance_upsert(value)
        .with_field("processDefinitionVersion", value.version)
        .with_field("parentProcessInstanceKey", value.parent_process_instance_key)
        .with_field("startDate", format_timestamp(&record.timestamp))
        .with_field("state", "ACTIVE")]
}

fn instance_ended(record: &RawRecord, state: &str) -> Vec<DocumentMutation> {
    let Some(value) = process_element_value(record) else {
        return Vec::new();
    };

    vec![instance_upsert(value)
        .with_field("endDate", format_timestamp(&record.timestamp))
        .with_field("state", state)]
}

fn instance_completed(record: &RawRecord) -> Vec<DocumentMutation> {
    instance_ended(record, "COMPLETED")
}

fn instance_canceled(record: &RawRecord) -> Vec<DocumentMutation> {
    instance_ended(record, "CANCELED")
}

fn incident_created(record: &RawRecord) -> Vec<DocumentMutation> {
    let Some(value) = incident_value(record) else {
        return Vec::new();
    };

    vec![DocumentMutation::upsert(DocumentIndex::Incident, record.key.to_string())
        .with_field("incidentKey", record.key)
        .with_field("processInstanceKey", value.process_instance_key)
        .with_field("processDefinitionKey", value.process_definition_key)
        .with_field("bpmnProcessId", value.bpmn_process_id.as_str())
        .with_field("elementId", value.element_id.as_str())
        .with_field("elementInstanceKey", value.element_instance_key)
        .with_field("errorType", value.error_type.as_str())
        .with_field("errorMessage", value.error_message.as_str())
        .with_field("tenantId", value.tenant_id.as_str())
        .with_field("createDate", format_timestamp(&record.timestamp))
        .with_field("state", "OPEN")]
}

fn incident_resolved(record: &RawRecord) -> Vec<DocumentMutation> {
    if incident_value(record).is_none() {
        return Vec::new();
    }

    vec![DocumentMutation::partial_update(DocumentIndex::Incident, record.key.to_string())
        .with_field("endDate", format_timestamp(&record.timestamp))
        .with_field("state", "RESOLVED")]
}

fn variable_changed(record: &RawRecord) -> Vec<DocumentMutation> {
    let Some(value) = variable_value(record) else {
        return Vec::new();
    };

    vec![DocumentMutation::upsert(
        DocumentIndex::Variable,
        format!("{}-{}", value.scope_key, value.name),
    )
    .with_field("name", value.name.as_str())
    .with_field("value", value.value.as_str())
    .with_field("scopeKey", value.scope_key)
    .with_field("processInstanceKey", value.process_instance_key)
    .with_field("processDefinitionKey", value.process_definition_key)
    .with_field("bpmnProcessId", value.bpmn_process_id.as_str())
    .with_field("tenantId", value.tenant_id.as_str())
    .with_field("lastUpdated", format_timestamp(&record.timestamp))]
}

//! OpenSearch index settings and mappings.
//!
//! This module defines the current mappings of every index the importer owns.
//! Document indices use `"dynamic": "strict"`, so a document carrying an
//! unmapped field is rejected instead of silently widening the schema; new
//! fields arrive through upgrade steps.

use serde_json::{json, Value};

use process_importer_shared::DocumentIndex;

fn settings() -> Value {
    json!({
        "number_of_shards": 1,
        "number_of_replicas": 1
    })
}

/// Field mappings of a document index at the current schema version.
pub fn document_index_properties(index: DocumentIndex) -> Value {
    match index {
        DocumentIndex::ProcessDefinition => json!({
            "processDefinitionKey": { "type": "long" },
            "bpmnProcessId": { "type": "keyword" },
            "version": { "type": "integer" },
            "resourceName": { "type": "keyword" },
            "tenantId": { "type": "keyword" },
            "deploymentDate": { "type": "date" },
            "partitionId": { "type": "integer" },
            "position": { "type": "long" }
        }),
        DocumentIndex::ProcessInstance => json!({
            "processInstanceKey": { "type": "long" },
            "processDefinitionKey": { "type": "long" },
            "bpmnProcessId": { "type": "keyword" },
            "processDefinitionVersion": { "type": "integer" },
            "parentProcessInstanceKey": { "type": "long" },
            "tenantId": { "type": "keyword" },
            "startDate": { "type": "date" },
            "endDate": { "type": "date" },
            "state": { "type": "keyword" },
            "partitionId": { "type": "integer" },
            "position": { "type": "long" }
        }),
        DocumentIndex::Incident => json!({
            "incidentKey": { "type": "long" },
            "processInstanceKey": { "type": "long" },
            "processDefinitionKey": { "type": "long" },
            "bpmnProcessId": { "type": "keyword" },
            "elementId": { "type": "keyword" },
            "elementInstanceKey": { "type": "long" },
            "errorType": { "type": "keyword" },
            "errorMessage": { "type": "text" },
            "tenantId": { "type": "keyword" },
            "createDate": { "type": "date" },
            "endDate": { "type": "date" },
            "state": { "type": "keyword" },
            "partitionId": { "type": "integer" },
            "position": { "type": "long" }
        }),
        DocumentIndex::Variable => json!({
            "name": { "type": "keyword" },
            "value": { "type": "keyword", "ignore_above": 8191 },
            "scopeKey": { "type": "long" },
            "processInstanceKey": { "type": "long" },
            "processDefinitionKey": { "type": "long" },
            "bpmnProcessId": { "type": "keyword" },
            "tenantId": { "type": "keyword" },
            "lastUpdated": { "type": "date" },
            "partitionId": { "type": "integer" },
            "position": { "type": "long" }
        }),
    }
}

/// Settings and mappings for creating a document index.
pub fn document_index_body(index: DocumentIndex) -> Value {
    json!({
        "settings": settings(),
        "mappings": {
            "dynamic": "strict",
            "properties": document_index_properties(index)
        }
    })
}

/// Settings and mappings for the import cursor index.
pub fn position_import_body() -> Value {
    json!({
        "settings": settings(),
        "mappings": {
            "properties": {
                "partitionId": { "type": "integer" },
                "recordType": { "type": "keyword" },
                "lastProcessedPosition": { "type": "long" },
                "lastUpdated": { "type": "date" }
            }
        }
    })
}

/// Settings and mappings for the metadata index (schema version and applied
/// upgrade steps).
pub fn metadata_body() -> Value {
    json!({
        "settings": settings(),
        "mappings": {
            "properties": {
                "type": { "type": "keyword" },
                "version": { "type": "keyword" },
                "stepIndex": { "type": "integer" },
                "appliedAt": { "type": "date" }
            }
        }
    })
}

//! Request and result types for storage operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::WriteFailure;
use process_importer_shared::{DocumentKey, Fields, SchemaVersion};

/// Result of one item of a bulk write.
///
/// Bulk writes return one result per submitted mutation, in submission order.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkItemResult {
    /// The document the item addressed.
    pub key: DocumentKey,
    /// `Ok` if the item was applied.
    pub outcome: Result<(), WriteFailure>,
}

impl BulkItemResult {
    pub fn applied(key: DocumentKey) -> Self {
        Self {
            key,
            outcome: Ok(()),
        }
    }

    pub fn failed(key: DocumentKey, failure: WriteFailure) -> Self {
        Self {
            key,
            outcome: Err(failure),
        }
    }

    pub fn is_applied(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Selects documents of one index for by-query operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DocumentFilter {
    /// Every document.
    All,
    /// Documents without a value for the field.
    FieldMissing(String),
    /// Documents with a value for the field.
    FieldExists(String),
    /// Documents whose field equals the value.
    FieldEquals(String, Value),
}

impl DocumentFilter {
    /// Whether a document's fields match this filter.
    pub fn matches(&self, document: &Fields) -> bool {
        let present = |field: &str| document.get(field).is_some_and(|value| !value.is_null());

        match self {
            DocumentFilter::All => true,
            DocumentFilter::FieldMissing(field) => !present(field),
            DocumentFilter::FieldExists(field) => present(field),
            DocumentFilter::FieldEquals(field, expected) => document.get(field) == Some(expected),
        }
    }
}

/// A change applied to every document selected by a filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldUpdate {
    /// Set the field to the value.
    Set { field: String, value: Value },
    /// Remove the field.
    Remove { field: String },
}

impl FieldUpdate {
    /// Apply the update to a document's fields.
    pub fn apply(&self, document: &mut Fields) {
        match self {
            FieldUpdate::Set { field, value } => {
                document.insert(field.clone(), value.clone());
            }
            FieldUpdate::Remove { field } => {
                document.remove(field);
            }
        }
    }
}

/// Marker of one upgrade step that has been executed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedStep {
    pub version: SchemaVersion,
    pub step_index: usize,
}

impl AppliedStep {
    pub fn new(version: SchemaVersion, step_index: usize) -> Self {
        Self {
            version,
            step_index,
        }
    }

    /// Id of the marker document.
    pub fn marker_id(&self) -> String {
        format!("upgrade-step-{}-{}", self.version, self.step_index)
    }
}

/// Persisted form of an applied-step marker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AppliedStepDocument {
    #[serde(rename = "type")]
    pub kind: String,
    pub version: SchemaVersion,
    pub step_index: usize,
    pub applied_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document(value: Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_filter_matches() {
        let doc = document(json!({ "state": "ACTIVE", "tenantId": null }));

        assert!(DocumentFilter::All.matches(&doc));
        assert!(DocumentFilter::FieldExists("state".into()).matches(&doc));
        assert!(DocumentFilter::FieldMissing("tenantId".into()).matches(&doc));
        assert!(DocumentFilter::FieldMissing("endDate".into()).matches(&doc));
        assert!(DocumentFilter::FieldEquals("state".into(), json!("ACTIVE")).matches(&doc));
        assert!(!DocumentFilter::FieldEquals("state".into(), json!("COMPLETED")).matches(&doc));
    }

    #[test]
    fn test_field_update_apply() {
        let mut doc = document(json!({ "engine": "camunda-bpm" }));

        FieldUpdate::Set {
            field: "tenantId".into(),
            value: json!("<default>"),
        }
        .apply(&mut doc);
        FieldUpdate::Remove {
            field: "engine".into(),
        }
        .apply(&mut doc);

        assert_eq!(Value::Object(doc), json!({ "tenantId": "<default>" }));
    }

    #[test]
    fn test_marker_id() {
        let step = AppliedStep::new(SchemaVersion::new(3, 1, 0), 2);
        assert_eq!(step.marker_id(), "upgrade-step-3.1.0-2");
    }
}

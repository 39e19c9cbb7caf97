//! Document mutations: the index-facing effect of an engine record.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Document fields of a mutation.
///
/// `serde_json::Map` keeps keys sorted, so equal mutations serialize to equal
/// bytes.
pub type Fields = serde_json::Map<String, Value>;

/// The importer-owned document indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentIndex {
    ProcessDefinition,
    ProcessInstance,
    Incident,
    Variable,
}

impl DocumentIndex {
    pub const ALL: [DocumentIndex; 4] = [
        DocumentIndex::ProcessDefinition,
        DocumentIndex::ProcessInstance,
        DocumentIndex::Incident,
        DocumentIndex::Variable,
    ];

    /// Index name suffix, appended to the configured prefix.
    pub fn as_str(self) -> &'static str {
        match self {
            DocumentIndex::ProcessDefinition => "process-definition",
            DocumentIndex::ProcessInstance => "process-instance",
            DocumentIndex::Incident => "incident",
            DocumentIndex::Variable => "variable",
        }
    }
}

impl fmt::Display for DocumentIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Address of one document: target index plus document id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocumentKey {
    pub index: DocumentIndex,
    pub id: String,
}

impl DocumentKey {
    pub fn new(index: DocumentIndex, id: impl Into<String>) -> Self {
        Self {
            index,
            id: id.into(),
        }
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.index, self.id)
    }
}

/// How a mutation changes its document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MutationOperation {
    /// Merge the fields into the document, creating it if absent.
    Upsert,
    /// Merge the fields into an existing document.
    PartialUpdate,
    /// Remove the document.
    Delete,
}

/// One change to one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMutation {
    pub index: DocumentIndex,
    pub document_id: String,
    pub operation: MutationOperation,
    pub fields: Fields,
}

impl DocumentMutation {
    pub fn upsert(index: DocumentIndex, document_id: impl Into<String>) -> Self {
        Self::new(index, document_id, MutationOperation::Upsert)
    }

    pub fn partial_update(index: DocumentIndex, document_id: impl Into<String>) -> Self {
        Self::new(index, document_id, MutationOperation::PartialUpdate)
    }

    pub fn delete(index: DocumentIndex, document_id: impl Into<String>) -> Self {
        Self::new(index, document_id, MutationOperation::Delete)
    }

    fn new(index: DocumentIndex, document_id: impl Into<String>, operation: MutationOperation) -> Self {
        Self {
            index,
            document_id: document_id.into(),
            operation,
            fields: Fields::new(),
        }
    }

    /// Set a field on the mutation.
    pub fn with_field(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    pub fn key(&self) -> DocumentKey {
        DocumentKey::new(self.index, self.document_id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_order_does_not_change_bytes() {
        let a = DocumentMutation::upsert(DocumentIndex::ProcessInstance, "42")
            .with_field("state", "ACTIVE")
            .with_field("bpmnProcessId", "order");
        let b = DocumentMutation::upsert(DocumentIndex::ProcessInstance, "42")
            .with_field("bpmnProcessId", "order")
            .with_field("state", "ACTIVE");

        assert_eq!(
            serde_json::to_vec(&a).unwrap(),
            serde_json::to_vec(&b).unwrap()
        );
    }

    #[test]
    fn test_document_key_display() {
        let mutation = DocumentMutation::delete(DocumentIndex::ProcessDefinition, "7");
        assert_eq!(mutation.key().to_string(), "process-definition/7");
        assert!(mutation.fields.is_empty());
    }
}

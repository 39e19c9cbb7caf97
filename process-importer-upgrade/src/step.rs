//! Upgrade steps and plans.
//!
//! A step is data: a target document index plus an action. Every action has
//! a predicate telling whether its effect is already present, so running a
//! step twice changes nothing the second time.

use serde_json::Value;
use std::fmt;

use process_importer_repository::{DocumentFilter, FieldUpdate, IndexAdmin, StoreError};
use process_importer_shared::{DocumentIndex, SchemaVersion};

/// Kind of change a step makes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepType {
    SchemaChange,
    DataMigration,
    DataDeletion,
}

/// What a step does to its target index.
#[derive(Debug, Clone, PartialEq)]
pub enum UpgradeAction {
    /// Add a field mapping.
    AddField { field: String, mapping: Value },
    /// Set a field on every document lacking it.
    BackfillField { field: String, value: Value },
    /// Remove a field from every document. The mapping itself stays, since
    /// an existing mapping cannot be removed in place.
    DropField { field: String },
    /// Delete every document matching the filter.
    DeleteDocuments { filter: DocumentFilter },
}

impl UpgradeAction {
    pub fn step_type(&self) -> StepType {
        match self {
            UpgradeAction::AddField { .. } => StepType::SchemaChange,
            UpgradeAction::BackfillField { .. } | UpgradeAction::DropField { .. } => {
                StepType::DataMigration
            }
            UpgradeAction::DeleteDocuments { .. } => StepType::DataDeletion,
        }
    }
}

impl fmt::Display for UpgradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpgradeAction::AddField { field, .. } => write!(f, "add field {}", field),
            UpgradeAction::BackfillField { field, value } => {
                write!(f, "backfill field {} with {}", field, value)
            }
            UpgradeAction::DropField { field } => write!(f, "drop field {}", field),
            UpgradeAction::DeleteDocuments { filter } => write!(f, "delete documents {:?}", filter),
        }
    }
}

/// One unit of schema or data migration.
#[derive(Debug, Clone, PartialEq)]
pub struct UpgradeStep {
    pub target: DocumentIndex,
    pub action: UpgradeAction,
}

impl UpgradeStep {
    pub fn add_field(target: DocumentIndex, field: &str, mapping: Value) -> Self {
        Self {
            target,
            action: UpgradeAction::AddField {
                field: field.to_string(),
                mapping,
            },
        }
    }

    pub fn backfill_field(target: DocumentIndex, field: &str, value: impl Into<Value>) -> Self {
        Self {
            target,
            action: UpgradeAction::BackfillField {
                field: field.to_string(),
                value: value.into(),
            },
        }
    }

    pub fn drop_field(target: DocumentIndex, field: &str) -> Self {
        Self {
            target,
            action: UpgradeAction::DropField {
                field: field.to_string(),
            },
        }
    }

    pub fn delete_documents(target: DocumentIndex, filter: DocumentFilter) -> Self {
        Self {
            target,
            action: UpgradeAction::DeleteDocuments { filter },
        }
    }

    pub fn step_type(&self) -> StepType {
        self.action.step_type()
    }

    /// Whether the step's effect is already present on the index.
    pub async fn is_applied(&self, admin: &dyn IndexAdmin, index: &str) -> Result<bool, StoreError> {
        match &self.action {
            UpgradeAction::AddField { field, mapping } => {
                Ok(admin.field_mapping(index, field).await?.as_ref() == Some(mapping))
            }
            UpgradeAction::BackfillField { field, .. } => Ok(admin
                .count_documents(index, &DocumentFilter::FieldMissing(field.clone()))
                .await?
                == 0),
            UpgradeAction::DropField { field } => Ok(admin
                .count_documents(index, &DocumentFilter::FieldExists(field.clone()))
                .await?
                == 0),
            UpgradeAction::DeleteDocuments { filter } => {
                Ok(admin.count_documents(index, filter).await? == 0)
            }
        }
    }

    /// Apply the step to the index. Returns the number of documents changed.
    pub async fn execute(&self, admin: &dyn IndexAdmin, index: &str) -> Result<u64, StoreError> {
        match &self.action {
            UpgradeAction::AddField { field, mapping } => {
                admin.put_field_mapping(index, field, mapping).await?;
                Ok(0)
            }
            UpgradeAction::BackfillField { field, value } => {
                admin
                    .update_documents(
                        index,
                        &DocumentFilter::FieldMissing(field.clone()),
                        &FieldUpdate::Set {
                            field: field.clone(),
                            value: value.clone(),
                        },
                    )
                    .await
            }
            UpgradeAction::DropField { field } => {
                admin
                    .update_documents(
                        index,
                        &DocumentFilter::FieldExists(field.clone()),
                        &FieldUpdate::Remove {
                            field: field.clone(),
                        },
                    )
                    .await
            }
            UpgradeAction::DeleteDocuments { filter } => admin.delete_documents(index, filter).await,
        }
    }
}

impl fmt::Display for UpgradeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {}", self.action, self.target)
    }
}

/// The ordered steps that bring the indices to one schema version.
#[derive(Debug, Clone, PartialEq)]
pub struct UpgradePlan {
    pub version: SchemaVersion,
    pub steps: Vec<UpgradeStep>,
}

impl UpgradePlan {
    pub fn new(version: SchemaVersion, steps: Vec<UpgradeStep>) -> Self {
        Self { version, steps }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use process_importer_repository::InMemoryIndex;
    use process_importer_shared::Fields;
    use serde_json::json;

    fn fields(value: Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    async fn index_with(documents: Vec<Value>) -> InMemoryIndex {
        let index = InMemoryIndex::new();
        index
            .create_index(
                "idx",
                &json!({ "mappings": { "properties": { "state": { "type": "keyword" } } } }),
            )
            .await
            .unwrap();
        for (id, document) in documents.into_iter().enumerate() {
            index.insert_document("idx", &id.to_string(), fields(document));
        }
        index
    }

    #[test]
    fn test_step_types() {
        let add = UpgradeStep::add_field(DocumentIndex::Incident, "tenantId", json!({ "type": "keyword" }));
        let drop = UpgradeStep::drop_field(DocumentIndex::Incident, "engine");
        let delete = UpgradeStep::delete_documents(DocumentIndex::Incident, DocumentFilter::All);

        assert_eq!(add.step_type(), StepType::SchemaChange);
        assert_eq!(drop.step_type(), StepType::DataMigration);
        assert_eq!(delete.step_type(), StepType::DataDeletion);
        assert_eq!(drop.to_string(), "drop field engine on incident");
    }

    #[tokio::test]
    async fn test_add_field_predicate() {
        let index = index_with(vec![]).await;
        let step = UpgradeStep::add_field(DocumentIndex::Incident, "tenantId", json!({ "type": "keyword" }));

        assert!(!step.is_applied(&index, "idx").await.unwrap());
        step.execute(&index, "idx").await.unwrap();
        assert!(step.is_applied(&index, "idx").await.unwrap());
    }

    #[tokio::test]
    async fn test_backfill_only_touches_documents_lacking_the_field() {
        let index = index_with(vec![
            json!({ "state": "ACTIVE" }),
            json!({ "state": "ACTIVE", "tenantId": "acme" }),
        ])
        .await;
        let step = UpgradeStep::backfill_field(DocumentIndex::Incident, "tenantId", "<default>");

        assert!(!step.is_applied(&index, "idx").await.unwrap());
        assert_eq!(step.execute(&index, "idx").await.unwrap(), 1);
        assert!(step.is_applied(&index, "idx").await.unwrap());

        let snapshot = index.snapshot();
        let documents = &snapshot["idx"].documents;
        assert_eq!(documents["0"]["tenantId"], json!("<default>"));
        assert_eq!(documents["1"]["tenantId"], json!("acme"));
    }

    #[tokio::test]
    async fn test_drop_field_and_delete_documents() {
        let index = index_with(vec![
            json!({ "state": "ACTIVE", "engine": "legacy" }),
            json!({ "state": "DELETED", "deleted": true }),
        ])
        .await;

        let drop = UpgradeStep::drop_field(DocumentIndex::ProcessInstance, "engine");
        assert_eq!(drop.execute(&index, "idx").await.unwrap(), 1);
        assert!(drop.is_applied(&index, "idx").await.unwrap());

        let delete = UpgradeStep::delete_documents(
            DocumentIndex::ProcessInstance,
            DocumentFilter::FieldEquals("deleted".to_string(), json!(true)),
        );
        assert_eq!(delete.execute(&index, "idx").await.unwrap(), 1);
        assert!(delete.is_applied(&index, "idx").await.unwrap());
        assert_eq!(index.snapshot()["idx"].documents.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_index_is_an_error() {
        let index = InMemoryIndex::new();
        let step = UpgradeStep::drop_field(DocumentIndex::ProcessInstance, "engine");

        assert!(matches!(
            step.is_applied(&index, "missing").await,
            Err(StoreError::NotFound(_))
        ));
    }
}

//! Compiled catalog of upgrade plans.

use serde_json::json;

use crate::errors::UpgradeError;
use crate::step::{UpgradePlan, UpgradeStep};
use process_importer_repository::DocumentFilter;
use process_importer_shared::{DocumentIndex, SchemaVersion, DEFAULT_TENANT_ID};

/// Schema version this build imports into.
pub const CURRENT_VERSION: SchemaVersion = SchemaVersion::new(3, 2, 0);

/// Version assumed for indices created before the schema version was
/// recorded.
pub const LEGACY_BASELINE_VERSION: SchemaVersion = SchemaVersion::new(3, 0, 0);

/// Every upgrade plan, ascending by version.
pub fn upgrade_plans() -> Vec<UpgradePlan> {
    vec![
        UpgradePlan::new(
            SchemaVersion::new(3, 1, 0),
            vec![
                UpgradeStep::add_field(
                    DocumentIndex::ProcessInstance,
                    "tenantId",
                    json!({ "type": "keyword" }),
                ),
                UpgradeStep::backfill_field(
                    DocumentIndex::ProcessInstance,
                    "tenantId",
                    DEFAULT_TENANT_ID,
                ),
                UpgradeStep::add_field(
                    DocumentIndex::Incident,
                    "tenantId",
                    json!({ "type": "keyword" }),
                ),
                UpgradeStep::backfill_field(DocumentIndex::Incident, "tenantId", DEFAULT_TENANT_ID),
            ],
        ),
        UpgradePlan::new(
            SchemaVersion::new(3, 2, 0),
            vec![
                UpgradeStep::drop_field(DocumentIndex::ProcessInstance, "engine"),
                UpgradeStep::delete_documents(
                    DocumentIndex::ProcessDefinition,
                    DocumentFilter::FieldEquals("deleted".to_string(), json!(true)),
                ),
            ],
        ),
    ]
}

/// Check that plans are strictly ascending and end at `target`.
pub fn validate_plans(plans: &[UpgradePlan], target: SchemaVersion) -> Result<(), UpgradeError> {
    for pair in plans.windows(2) {
        if pair[0].version >= pair[1].version {
            return Err(UpgradeError::invalid_catalog(format!(
                "plan {} is not after {}",
                pair[1].version, pair[0].version
            )));
        }
    }

    match plans.last() {
        Some(last) if last.version > target => Err(UpgradeError::invalid_catalog(format!(
            "plan {} is newer than the target version {}",
            last.version, target
        ))),
        _ => Ok(()),
    }
}


#[cfg(test)]
mod tests {
    use super::legacy::{legacy_document_index_body, legacy_document_index_properties};
    use super::*;
    use process_importer_repository::opensearch::index_config::document_index_properties;

    #[test]
    fn test_catalog_ends_at_current_version() {
        let plans = upgrade_plans();

        validate_plans(&plans, CURRENT_VERSION).unwrap();
        assert_eq!(plans.last().unwrap().version, CURRENT_VERSION);
        assert!(plans.iter().all(|plan| plan.version > LEGACY_BASELINE_VERSION));
    }

    #[test]
    fn test_unordered_plans_are_rejected() {
        let plans = vec![
            UpgradePlan::new(SchemaVersion::new(2, 0, 0), vec![]),
            UpgradePlan::new(SchemaVersion::new(1, 0, 0), vec![]),
        ];

        assert!(matches!(
            validate_plans(&plans, SchemaVersion::new(2, 0, 0)),
            Err(UpgradeError::InvalidCatalog(_))
        ));
    }

    #[test]
    fn test_added_fields_match_current_mappings() {
        for plan in upgrade_plans() {
            for step in plan.steps {
                if let crate::step::UpgradeAction::AddField { field, mapping } = &step.action {
                    assert_eq!(&document_index_properties(step.target)[field.as_str()], mapping);
                }
            }
        }
    }

    #[test]
    fn test_legacy_mappings() {
        let instance = legacy_document_index_properties(DocumentIndex::ProcessInstance);
        assert!(instance.get("tenantId").is_none());
        assert!(instance.get("engine").is_some());

        let body = legacy_document_index_body(DocumentIndex::ProcessDefinition);
        assert_eq!(body["mappings"]["properties"]["deleted"]["type"], "boolean");
    }
}

use serde_json::{json, Value};
use std::sync::Arc;

use process_importer_repository::{
    AppliedStep, DocumentFilter, IndexAdmin, IndexNames, InMemoryIndex, UpgradeMarkerStore,
};
use process_importer_shared::{DocumentIndex, Fields, SchemaVersion};
use process_importer_upgrade::{
    BootstrapOutcome, StepOutcome, UpgradeError, UpgradeExecutor, UpgradePlan, UpgradeStep,
};

const V1: SchemaVersion = SchemaVersion::new(1, 0, 0);
const V2: SchemaVersion = SchemaVersion::new(2, 0, 0);
const V3: SchemaVersion = SchemaVersion::new(3, 0, 0);

fn fields(value: Value) -> Fields {
    value.as_object().cloned().unwrap()
}

fn names() -> IndexNames {
    IndexNames::new("upgrade-test", "zeebe-record")
}

fn plans() -> Vec<UpgradePlan> {
    vec![
        UpgradePlan::new(
            V2,
            vec![
                UpgradeStep::add_field(
                    DocumentIndex::Variable,
                    "tenantId",
                    json!({ "type": "keyword" }),
                ),
                UpgradeStep::backfill_field(DocumentIndex::Variable, "tenantId", "<default>"),
            ],
        ),
        UpgradePlan::new(
            V3,
            vec![UpgradeStep::drop_field(DocumentIndex::Variable, "legacyScope")],
        ),
    ]
}

fn executor(index: &Arc<InMemoryIndex>) -> UpgradeExecutor {
    UpgradeExecutor::with_plans(index.clone(), index.clone(), names(), plans(), V3)
}

/// A variable index at V1: no tenant, plus a field V3 drops.
async fn v1_install() -> Arc<InMemoryIndex> {
    let index = Arc::new(InMemoryIndex::with_names(names()));
    let variables = names().document_index(DocumentIndex::Variable);
    index
        .create_index(
            &variables,
            &json!({
                "mappings": {
                    "dynamic": "strict",
                    "properties": {
                        "name": { "type": "keyword" },
                        "value": { "type": "keyword" },
                        "legacyScope": { "type": "keyword" }
                    }
                }
            }),
        )
        .await
        .unwrap();
    index.insert_document(
        &variables,
        "500-amount",
        fields(json!({ "name": "amount", "value": "42", "legacyScope": "GLOBAL" })),
    );
    index.insert_document(
        &variables,
        "500-owner",
        fields(json!({ "name": "owner", "value": "\"jo\"", "tenantId": "acme" })),
    );
    index.set_installed_version(V1).await.unwrap();
    index
}

#[tokio::test]
async fn upgrade_applies_every_step_once() {
    let index = v1_install().await;

    let report = executor(&index).run().await.unwrap();
    assert_eq!(report.bootstrap, BootstrapOutcome::Existing(V1));
    assert_eq!(report.installed_after, V3);
    assert_eq!(
        report
            .steps
            .iter()
            .map(|step| step.outcome)
            .collect::<Vec<_>>(),
        vec![
            StepOutcome::Executed { affected: 0 },
            StepOutcome::Executed { affected: 1 },
            StepOutcome::Executed { affected: 1 },
        ]
    );

    assert_eq!(
        index.applied_steps().await.unwrap(),
        vec![
            AppliedStep::new(V2, 0),
            AppliedStep::new(V2, 1),
            AppliedStep::new(V3, 0),
        ]
    );
    assert_eq!(index.installed_version().await.unwrap(), Some(V3));

    let variables = index.documents(DocumentIndex::Variable);
    assert_eq!(
        variables["500-amount"],
        fields(json!({ "name": "amount", "value": "42", "tenantId": "<default>" }))
    );
    assert_eq!(variables["500-owner"]["tenantId"], json!("acme"));

    let variables_index = names().document_index(DocumentIndex::Variable);
    assert_eq!(
        index
            .count_documents(&variables_index, &DocumentFilter::FieldExists("legacyScope".into()))
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn rerunning_an_upgrade_changes_nothing() {
    let index = v1_install().await;
    executor(&index).run().await.unwrap();
    let after_first = index.snapshot();

    let report = executor(&index).run().await.unwrap();
    assert!(report.steps.is_empty());
    assert_eq!(index.snapshot(), after_first);

    // With the version rolled back, the marker still short-circuits every step.
    index.set_installed_version(V1).await.unwrap();
    let report = executor(&index).run().await.unwrap();
    assert!(report
        .steps
        .iter()
        .all(|step| step.outcome == StepOutcome::Skipped));
    assert_eq!(index.snapshot(), after_first);
}

#[tokio::test]
async fn lost_marker_falls_back_to_step_predicates() {
    let index = v1_install().await;
    executor(&index).run().await.unwrap();
    let after_first = index.snapshot();

    let fresh = Arc::new(InMemoryIndex::with_names(names()));
    for (name, contents) in &after_first {
        fresh
            .create_index(name, &json!({ "mappings": { "properties": contents.mappings } }))
            .await
            .unwrap();
        for (id, document) in &contents.documents {
            fresh.insert_document(name, id, document.clone());
        }
    }
    fresh.set_installed_version(V1).await.unwrap();

    let report = executor(&fresh).run().await.unwrap();
    assert!(report
        .steps
        .iter()
        .all(|step| step.outcome == StepOutcome::AlreadyApplied));
    assert_eq!(
        fresh.documents(DocumentIndex::Variable),
        index.documents(DocumentIndex::Variable)
    );
}

#[tokio::test]
async fn partial_upgrade_stops_and_keeps_completed_steps() {
    let index = v1_install().await;
    let variables = names().document_index(DocumentIndex::Variable);
    index
        .put_field_mapping(&variables, "tenantId", &json!({ "type": "long" }))
        .await
        .unwrap();

    let err = executor(&index).run().await.unwrap_err();
    assert!(matches!(
        err,
        UpgradeError::StepFailed {
            version: V2,
            step_index: 0,
            ..
        }
    ));
    assert!(err.to_string().contains("add field tenantId"));
    assert!(index.applied_steps().await.unwrap().is_empty());
    assert_eq!(index.installed_version().await.unwrap(), Some(V1));
    assert!(index.documents(DocumentIndex::Variable)["500-amount"]
        .get("legacyScope")
        .is_some());

    assert!(matches!(
        executor(&index).ensure_current().await,
        Err(UpgradeError::SchemaNotCurrent {
            installed: Some(V1),
            expected: V3
        })
    ));
}

#[tokio::test]
async fn missing_indices_are_created_on_existing_installs() {
    let index = v1_install().await;
    executor(&index).run().await.unwrap();

    for document_index in DocumentIndex::ALL {
        assert!(index
            .index_exists(&names().document_index(document_index))
            .await
            .unwrap());
    }
    assert!(index.index_exists(&names().metadata()).await.unwrap());
    assert!(index.index_exists(&names().position_import()).await.unwrap());
    executor(&index).ensure_current().await.unwrap();
}

#[tokio::test]
async fn out_of_order_catalog_is_rejected_before_touching_indices() {
    let index = Arc::new(InMemoryIndex::with_names(names()));
    let executor = UpgradeExecutor::with_plans(
        index.clone(),
        index.clone(),
        names(),
        vec![UpgradePlan::new(V3, vec![]), UpgradePlan::new(V2, vec![])],
        V3,
    );

    assert!(matches!(
        executor.run().await,
        Err(UpgradeError::InvalidCatalog(_))
    ));
    assert!(index.snapshot().is_empty());
}

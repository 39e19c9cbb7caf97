//! Upgrade step executor.
//!
//! Brings the importer indices to the current schema version: bootstrap
//! creates what is missing, then every plan newer than the installed version
//! runs step by step. Each executed step is recorded in the applied-steps
//! marker and each finished plan advances the installed version, so an
//! interrupted upgrade resumes where it stopped.

use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{error, info, instrument};

use crate::catalog::{upgrade_plans, validate_plans, CURRENT_VERSION, LEGACY_BASELINE_VERSION};
use crate::errors::UpgradeError;
use crate::step::{StepType, UpgradePlan, UpgradeStep};
use process_importer_repository::opensearch::index_config::{
    document_index_body, metadata_body, position_import_body,
};
use process_importer_repository::{AppliedStep, IndexAdmin, IndexNames, UpgradeMarkerStore};
use process_importer_shared::{DocumentIndex, SchemaVersion};

/// What bootstrap found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// No importer index existed; everything was created at the target
    /// version.
    FreshInstall,
    /// Indices existed without a recorded version and were assumed to be at
    /// the legacy baseline.
    AssumedLegacy,
    /// A version was already recorded.
    Existing(SchemaVersion),
}

/// Outcome of one step in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The marker recorded the step; it was not evaluated.
    Skipped,
    /// The step's effect was already present.
    AlreadyApplied,
    /// The step ran and changed this many documents.
    Executed { affected: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub version: SchemaVersion,
    pub step_index: usize,
    pub step_type: StepType,
    pub target: DocumentIndex,
    pub outcome: StepOutcome,
}

/// Summary of an upgrade run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeReport {
    pub bootstrap: BootstrapOutcome,
    pub installed_before: Option<SchemaVersion>,
    pub installed_after: SchemaVersion,
    pub steps: Vec<StepReport>,
}

/// Executor running upgrade plans against the importer indices.
///
/// Runs alone, before any import pair starts.
pub struct UpgradeExecutor {
    admin: Arc<dyn IndexAdmin>,
    markers: Arc<dyn UpgradeMarkerStore>,
    names: IndexNames,
    plans: Vec<UpgradePlan>,
    target: SchemaVersion,
}

impl UpgradeExecutor {
    /// Create an executor with the compiled plan catalog.
    pub fn new(
        admin: Arc<dyn IndexAdmin>,
        markers: Arc<dyn UpgradeMarkerStore>,
        names: IndexNames,
    ) -> Self {
        Self {
            admin,
            markers,
            names,
            plans: upgrade_plans(),
            target: CURRENT_VERSION,
        }
    }

    /// Create an executor with custom plans and target version.
    pub fn with_plans(
        admin: Arc<dyn IndexAdmin>,
        markers: Arc<dyn UpgradeMarkerStore>,
        names: IndexNames,
        plans: Vec<UpgradePlan>,
        target: SchemaVersion,
    ) -> Self {
        Self {
            admin,
            markers,
            names,
            plans,
            target,
        }
    }

    pub fn target_version(&self) -> SchemaVersion {
        self.target
    }

    /// Make sure every importer index exists and a version is recorded.
    #[instrument(skip(self))]
    pub async fn bootstrap(&self) -> Result<BootstrapOutcome, UpgradeError> {
        self.admin
            .create_index(&self.names.position_import(), &position_import_body())
            .await?;
        self.admin
            .create_index(&self.names.metadata(), &metadata_body())
            .await?;

        let mut missing = Vec::new();
        for index in DocumentIndex::ALL {
            if !self.admin.index_exists(&self.names.document_index(index)).await? {
                missing.push(index);
            }
        }

        let outcome = match self.markers.installed_version().await? {
            Some(version) => BootstrapOutcome::Existing(version),
            None if missing.len() == DocumentIndex::ALL.len() => BootstrapOutcome::FreshInstall,
            None => BootstrapOutcome::AssumedLegacy,
        };

        for index in missing {
            let name = self.names.document_index(index);
            self.admin
                .create_index(&name, &document_index_body(index))
                .await?;
            info!(index = %name, "Created missing document index");
        }

        match outcome {
            BootstrapOutcome::FreshInstall => {
                self.markers.set_installed_version(self.target).await?;
                info!(version = %self.target, "Fresh install at current schema version");
            }
            BootstrapOutcome::AssumedLegacy => {
                self.markers
                    .set_installed_version(LEGACY_BASELINE_VERSION)
                    .await?;
                info!(
                    version = %LEGACY_BASELINE_VERSION,
                    "No schema version recorded, assuming legacy baseline"
                );
            }
            BootstrapOutcome::Existing(version) => {
                info!(version = %version, "Found installed schema version");
            }
        }

        Ok(outcome)
    }

    /// Bootstrap, then run every plan newer than the installed version.
    ///
    /// Stops at the first failing step. Steps and plans completed before the
    /// failure stay recorded; nothing is rolled back.
    #[instrument(skip(self), fields(target = %self.target))]
    pub async fn run(&self) -> Result<UpgradeReport, UpgradeError> {
        validate_plans(&self.plans, self.target)?;

        let bootstrap = self.bootstrap().await?;
        let installed_before = match bootstrap {
            BootstrapOutcome::FreshInstall => None,
            BootstrapOutcome::AssumedLegacy => Some(LEGACY_BASELINE_VERSION),
            BootstrapOutcome::Existing(version) => Some(version),
        };

        let mut installed = installed_before.unwrap_or(self.target);
        let applied: BTreeSet<AppliedStep> =
            self.markers.applied_steps().await?.into_iter().collect();
        let mut steps = Vec::new();

        let start = installed;
        for plan in self.plans.iter().filter(|plan| plan.version > start) {
            info!(version = %plan.version, steps = plan.steps.len(), "Running upgrade plan");

            for (step_index, step) in plan.steps.iter().enumerate() {
                let marker = AppliedStep::new(plan.version, step_index);
                if applied.contains(&marker) {
                    steps.push(StepReport {
                        version: plan.version,
                        step_index,
                        step_type: step.step_type(),
                        target: step.target,
                        outcome: StepOutcome::Skipped,
                    });
                    continue;
                }

                let outcome = self.apply_step(plan.version, step_index, step).await?;
                self.markers.record_applied_step(&marker).await?;
                steps.push(StepReport {
                    version: plan.version,
                    step_index,
                    step_type: step.step_type(),
                    target: step.target,
                    outcome,
                });
            }

            self.markers.set_installed_version(plan.version).await?;
            installed = plan.version;
            info!(version = %plan.version, "Schema version installed");
        }

        if installed != self.target {
            return Err(UpgradeError::SchemaNotCurrent {
                installed: Some(installed),
                expected: self.target,
            });
        }

        Ok(UpgradeReport {
            bootstrap,
            installed_before,
            installed_after: installed,
            steps,
        })
    }

    /// Run one step unless its effect is already present.
    #[instrument(
        skip(self, step),
        fields(version = %version, step_type = ?step.step_type(), target = %step.target)
    )]
    async fn apply_step(
        &self,
        version: SchemaVersion,
        step_index: usize,
        step: &UpgradeStep,
    ) -> Result<StepOutcome, UpgradeError> {
        let index_name = self.names.document_index(step.target);
        let outcome = match step.is_applied(self.admin.as_ref(), &index_name).await {
            Ok(true) => Ok(StepOutcome::AlreadyApplied),
            Ok(false) => step
                .execute(self.admin.as_ref(), &index_name)
                .await
                .map(|affected| StepOutcome::Executed { affected }),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(outcome) => {
                info!(step = %step, outcome = ?outcome, "Upgrade step done");
                Ok(outcome)
            }
            Err(e) => {
                error!(step = %step, error = %e, "Upgrade step failed");
                Err(UpgradeError::StepFailed {
                    version,
                    step_index,
                    target_index: index_name,
                    action: step.action.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Refuse to import unless the indices are at the target version.
    pub async fn ensure_current(&self) -> Result<(), UpgradeError> {
        let installed = self.markers.installed_version().await?;
        if installed == Some(self.target) {
            Ok(())
        } else {
            Err(UpgradeError::SchemaNotCurrent {
                installed,
                expected: self.target,
            })
        }
    }
}

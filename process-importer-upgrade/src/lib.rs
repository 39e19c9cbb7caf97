//! # Process Importer Upgrade
//!
//! Versioned schema and data migrations for the importer indices. Plans are
//! compiled into the binary and run in version order by the
//! [`UpgradeExecutor`] before any import starts.

pub mod catalog;
pub mod errors;
pub mod executor;
pub mod step;

pub use catalog::{upgrade_plans, CURRENT_VERSION, LEGACY_BASELINE_VERSION};
pub use errors::UpgradeError;
pub use executor::{BootstrapOutcome, StepOutcome, StepReport, UpgradeExecutor, UpgradeReport};
pub use step::{StepType, UpgradeAction, UpgradePlan, UpgradeStep};

//! Upgrade marker store trait definition.

use async_trait::async_trait;

use crate::errors::StoreError;
use crate::types::AppliedStep;
use process_importer_shared::SchemaVersion;

/// Persisted record of which upgrade steps ran and which schema version the
/// indices are at.
#[async_trait]
pub trait UpgradeMarkerStore: Send + Sync {
    /// Every applied step, ordered by version then step index.
    async fn applied_steps(&self) -> Result<Vec<AppliedStep>, StoreError>;

    async fn record_applied_step(&self, step: &AppliedStep) -> Result<(), StoreError>;

    /// The installed schema version, `None` before the first bootstrap.
    async fn installed_version(&self) -> Result<Option<SchemaVersion>, StoreError>;

    async fn set_installed_version(&self, version: SchemaVersion) -> Result<(), StoreError>;
}

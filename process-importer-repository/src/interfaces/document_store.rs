//! Document store trait definition.

use async_trait::async_trait;

use crate::errors::StoreError;
use crate::types::BulkItemResult;
use process_importer_shared::DocumentMutation;

/// Write access to the importer's document indices.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; every import pair shares one store.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Apply mutations as one bulk request.
    ///
    /// Mutations addressing the same document are applied in slice order.
    ///
    /// # Returns
    ///
    /// * `Ok(results)` - One result per mutation, in the same order
    /// * `Err(StoreError)` - If the bulk request as a whole failed; nothing
    ///   can be assumed about which items were applied
    async fn bulk_apply(
        &self,
        mutations: &[DocumentMutation],
    ) -> Result<Vec<BulkItemResult>, StoreError>;

    /// Check if the store is healthy and reachable.
    async fn health_check(&self) -> Result<bool, StoreError>;
}

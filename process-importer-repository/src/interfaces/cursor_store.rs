//! Import cursor store trait definition.

use async_trait::async_trait;

use crate::errors::StoreError;
use process_importer_shared::{ImportCursor, ImportPair};

/// Durable storage of the last processed position per import pair.
#[async_trait]
pub trait CursorStore: Send + Sync {
    /// Load the cursor of a pair. A pair that never committed returns
    /// `ImportCursor::initial`.
    async fn load_cursor(&self, pair: ImportPair) -> Result<ImportCursor, StoreError>;

    /// Persist a cursor. Replaces the pair's previous cursor atomically.
    async fn store_cursor(&self, cursor: &ImportCursor) -> Result<(), StoreError>;

    /// Forget a pair's cursor so the next import starts before all positions.
    async fn reset_cursor(&self, pair: ImportPair) -> Result<(), StoreError>;
}

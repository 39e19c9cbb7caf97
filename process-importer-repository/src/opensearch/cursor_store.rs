//! Import cursors stored in the position-import index.

use async_trait::async_trait;
use opensearch::{DeleteParts, GetParts, IndexParts};
use tracing::debug;

use crate::errors::StoreError;
use crate::interfaces::CursorStore;
use crate::opensearch::client::{read_json, transport_error, OpenSearchClient};
use process_importer_shared::{ImportCursor, ImportPair};

#[async_trait]
impl CursorStore for OpenSearchClient {
    async fn load_cursor(&self, pair: ImportPair) -> Result<ImportCursor, StoreError> {
        let index_name = self.names.position_import();
        let cursor_id = pair.cursor_id();

        let response = self
            .client
            .get(GetParts::IndexId(&index_name, &cursor_id))
            .send()
            .await
            .map_err(transport_error)?;

        // Covers both a missing document and a missing index.
        if response.status_code().as_u16() == 404 {
            return Ok(ImportCursor::initial(pair));
        }

        let body = read_json(response, "load cursor").await?;
        let cursor: ImportCursor = serde_json::from_value(body["_source"].clone())
            .map_err(|e| StoreError::parse(format!("cursor {}: {}", cursor_id, e)))?;

        if cursor.pair() != pair {
            return Err(StoreError::parse(format!(
                "cursor {} belongs to {}",
                cursor_id,
                cursor.pair()
            )));
        }

        Ok(cursor)
    }

    /// Indexing a single document is atomic, so a cursor is either the old
    /// or the new value, never a mix.
    async fn store_cursor(&self, cursor: &ImportCursor) -> Result<(), StoreError> {
        let index_name = self.names.position_import();
        let cursor_id = cursor.pair().cursor_id();
        let body = serde_json::to_value(cursor)
            .map_err(|e| StoreError::parse(format!("cursor {}: {}", cursor_id, e)))?;

        let response = self
            .client
            .index(IndexParts::IndexId(&index_name, &cursor_id))
            .body(body)
            .send()
            .await
            .map_err(transport_error)?;

        read_json(response, "store cursor").await?;
        debug!(cursor_id = %cursor_id, position = %cursor.last_processed_position, "Stored cursor");
        Ok(())
    }

    async fn reset_cursor(&self, pair: ImportPair) -> Result<(), StoreError> {
        let index_name = self.names.position_import();
        let cursor_id = pair.cursor_id();

        let response = self
            .client
            .delete(DeleteParts::IndexId(&index_name, &cursor_id))
            .send()
            .await
            .map_err(transport_error)?;

        // 404 is acceptable - the pair may never have committed
        if response.status_code().as_u16() == 404 {
            return Ok(());
        }

        read_json(response, "reset cursor").await?;
        Ok(())
    }
}

//! Engine record reads from the exporter's indices.

use async_trait::async_trait;
use opensearch::SearchParts;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::errors::StoreError;
use crate::interfaces::RecordSource;
use crate::opensearch::client::{read_json, transport_error, OpenSearchClient};
use crate::opensearch::queries::build_record_page_query;
use process_importer_shared::{PartitionId, Position, RecordType};

#[async_trait]
impl RecordSource for OpenSearchClient {
    #[instrument(skip(self), fields(partition_id = %partition_id, record_type = %record_type))]
    async fn read_records(
        &self,
        partition_id: PartitionId,
        record_type: RecordType,
        after: Position,
        max_count: usize,
    ) -> Result<Vec<Value>, StoreError> {
        let pattern = self.names.exporter_pattern(record_type);
        let query = build_record_page_query(partition_id, record_type, after, max_count);

        // The exporter creates its indices lazily; a missing index is an
        // empty page.
        let response = self
            .client
            .search(SearchParts::Index(&[pattern.as_str()]))
            .ignore_unavailable(true)
            .allow_no_indices(true)
            .body(query)
            .send()
            .await
            .map_err(transport_error)?;

        let body = read_json(response, "record page").await?;
        let hits = body["hits"]["hits"]
            .as_array()
            .ok_or_else(|| StoreError::parse("record page without hits"))?;

        let records: Vec<Value> = hits.iter().map(|hit| hit["_source"].clone()).collect();

        debug!(count = records.len(), after = %after, "Read record page");
        Ok(records)
    }
}

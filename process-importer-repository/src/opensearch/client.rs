//! OpenSearch client implementation.
//!
//! This module provides the connection to OpenSearch and the concrete
//! `DocumentStore` implementation. The other storage interfaces are
//! implemented on the same client in sibling modules.

use async_trait::async_trait;
use opensearch::{
    cluster::ClusterHealthParts,
    http::{
        request::JsonBody,
        response::Response,
        transport::{SingleNodeConnectionPool, TransportBuilder},
    },
    BulkParts, OpenSearch,
};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, info, instrument};
use url::Url;

use crate::config::IndexNames;
use crate::errors::{StoreError, WriteFailure};
use crate::interfaces::DocumentStore;
use crate::opensearch::queries::build_bulk_lines;
use crate::types::BulkItemResult;
use process_importer_shared::{DocumentKey, DocumentMutation, MutationOperation};

/// OpenSearch client implementation.
///
/// One instance is shared by every import pair and by the upgrade executor.
/// Requests that exceed the configured timeout fail with
/// `StoreError::ConnectionError`, which callers treat as transient.
///
/// # Example
///
/// ```ignore
/// use std::time::Duration;
/// use process_importer_repository::{IndexNames, OpenSearchClient};
///
/// let client = OpenSearchClient::new(
///     "http://localhost:9200",
///     IndexNames::default(),
///     Duration::from_secs(30),
/// )?;
/// let healthy = client.health_check().await?;
/// ```
#[derive(Clone)]
pub struct OpenSearchClient {
    pub(crate) client: OpenSearch,
    pub(crate) names: IndexNames,
}

impl OpenSearchClient {
    /// Create a new OpenSearch client connected to the specified URL.
    ///
    /// # Arguments
    ///
    /// * `url` - The OpenSearch server URL (e.g., "http://localhost:9200")
    /// * `names` - Names of the importer and exporter indices
    /// * `timeout` - Hard timeout applied to every request
    ///
    /// # Returns
    ///
    /// * `Ok(OpenSearchClient)` - A new client instance
    /// * `Err(StoreError)` - If connection setup fails
    pub fn new(url: &str, names: IndexNames, timeout: Duration) -> Result<Self, StoreError> {
        let parsed_url = Url::parse(url).map_err(|e| StoreError::validation(e.to_string()))?;

        let conn_pool = SingleNodeConnectionPool::new(parsed_url);
        let transport = TransportBuilder::new(conn_pool)
            .disable_proxy()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::connection(e.to_string()))?;

        let client = OpenSearch::new(transport);

        info!(
            url = %url,
            prefix = %names.prefix,
            exporter_prefix = %names.exporter_prefix,
            timeout_ms = timeout.as_millis() as u64,
            "Created OpenSearch client"
        );

        Ok(Self { client, names })
    }

    pub fn names(&self) -> &IndexNames {
        &self.names
    }
}

/// Map a transport failure (refused connection, timeout) to a store error.
pub(crate) fn transport_error(error: opensearch::Error) -> StoreError {
    StoreError::connection(error.to_string())
}

/// Read a JSON response body, turning error statuses into `StoreError`.
pub(crate) async fn read_json(response: Response, context: &str) -> Result<Value, StoreError> {
    let status = response.status_code();
    if !status.is_success() {
        let error_body = response.text().await.unwrap_or_default();
        error!(status = %status, body = %error_body, context = context, "Request failed");
        return Err(StoreError::request(
            status.as_u16(),
            format!("{} failed: {}", context, error_body),
        ));
    }

    response
        .json::<Value>()
        .await
        .map_err(|e| StoreError::parse(format!("{} response: {}", context, e)))
}

/// Translate one entry of a bulk response's `items` array.
///
/// Deleting a document that does not exist counts as applied.
fn parse_bulk_item(key: DocumentKey, operation: MutationOperation, item: &Value) -> BulkItemResult {
    let Some(result) = item.as_object().and_then(|item| item.values().next()) else {
        return BulkItemResult::failed(key, WriteFailure::permanent("bulk item without status"));
    };

    let status = result["status"].as_u64().unwrap_or(0) as u16;
    let failed = result.get("error").is_some() || !(200..300).contains(&status);

    if !failed || (operation == MutationOperation::Delete && status == 404) {
        return BulkItemResult::applied(key);
    }

    let reason = format!(
        "{}: {}",
        result["error"]["type"].as_str().unwrap_or("unknown_error"),
        result["error"]["reason"].as_str().unwrap_or("no reason given")
    );
    BulkItemResult::failed(key, WriteFailure::from_item_status(status, reason))
}

#[async_trait]
impl DocumentStore for OpenSearchClient {
    /// Apply mutations with one `_bulk` request.
    ///
    /// OpenSearch executes the items addressing one document in request
    /// order, and reports a status per item in the same order.
    #[instrument(skip(self, mutations), fields(count = mutations.len()))]
    async fn bulk_apply(
        &self,
        mutations: &[DocumentMutation],
    ) -> Result<Vec<BulkItemResult>, StoreError> {
        if mutations.is_empty() {
            return Ok(Vec::new());
        }

        let mut body: Vec<JsonBody<Value>> = Vec::with_capacity(mutations.len() * 2);
        for mutation in mutations {
            let index_name = self.names.document_index(mutation.index);
            let (action, source) = build_bulk_lines(&index_name, mutation);
            body.push(action.into());
            if let Some(source) = source {
                body.push(source.into());
            }
        }

        let response = self
            .client
            .bulk(BulkParts::None)
            .body(body)
            .send()
            .await
            .map_err(transport_error)?;

        let response_body = read_json(response, "bulk").await?;
        let items = response_body["items"]
            .as_array()
            .ok_or_else(|| StoreError::parse("bulk response without items"))?;

        if items.len() != mutations.len() {
            return Err(StoreError::parse(format!(
                "bulk response has {} items for {} mutations",
                items.len(),
                mutations.len()
            )));
        }

        let results: Vec<BulkItemResult> = mutations
            .iter()
            .zip(items)
            .map(|(mutation, item)| parse_bulk_item(mutation.key(), mutation.operation, item))
            .collect();

        debug!(
            failed = results.iter().filter(|result| !result.is_applied()).count(),
            "Bulk request completed"
        );
        Ok(results)
    }

    async fn health_check(&self) -> Result<bool, StoreError> {
        let response = self
            .client
            .cluster()
            .health(ClusterHealthParts::None)
            .send()
            .await
            .map_err(transport_error)?;

        let body = read_json(response, "cluster health").await?;
        Ok(matches!(body["status"].as_str(), Some("green") | Some("yellow")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use process_importer_shared::DocumentIndex;
    use serde_json::json;

    fn key() -> DocumentKey {
        DocumentKey::new(DocumentIndex::ProcessInstance, "42")
    }

    #[test]
    fn test_parse_bulk_item_success() {
        let item = json!({ "update": { "_id": "42", "status": 200, "result": "updated" } });
        assert!(parse_bulk_item(key(), MutationOperation::Upsert, &item).is_applied());
    }

    #[test]
    fn test_parse_bulk_item_throttled() {
        let item = json!({
            "update": {
                "_id": "42",
                "status": 429,
                "error": { "type": "es_rejected_execution_exception", "reason": "queue full" }
            }
        });

        let result = parse_bulk_item(key(), MutationOperation::Upsert, &item);
        assert_eq!(
            result.outcome,
            Err(WriteFailure::transient("es_rejected_execution_exception: queue full"))
        );
    }

    #[test]
    fn test_parse_bulk_item_mapping_error() {
        let item = json!({
            "update": {
                "_id": "42",
                "status": 400,
                "error": { "type": "strict_dynamic_mapping_exception", "reason": "mapping set to strict" }
            }
        });

        let result = parse_bulk_item(key(), MutationOperation::Upsert, &item);
        assert!(matches!(result.outcome, Err(WriteFailure::Permanent(_))));
    }

    #[test]
    fn test_parse_bulk_item_delete_not_found() {
        let item = json!({ "delete": { "_id": "42", "status": 404, "result": "not_found" } });
        assert!(parse_bulk_item(key(), MutationOperation::Delete, &item).is_applied());
    }

    #[test]
    fn test_parse_bulk_item_partial_update_missing_document() {
        let item = json!({
            "update": {
                "_id": "42",
                "status": 404,
                "error": { "type": "document_missing_exception", "reason": "[42]: document missing" }
            }
        });

        let result = parse_bulk_item(key(), MutationOperation::PartialUpdate, &item);
        assert!(matches!(result.outcome, Err(WriteFailure::Permanent(_))));
    }

    #[test]
    fn test_parse_bulk_item_without_status() {
        let result = parse_bulk_item(key(), MutationOperation::Upsert, &json!("garbage"));
        assert!(!result.is_applied());
    }
}

//! Index administration and upgrade metadata on OpenSearch.

use async_trait::async_trait;
use chrono::Utc;
use opensearch::{
    indices::{IndicesCreateParts, IndicesExistsParts, IndicesGetMappingParts, IndicesPutMappingParts},
    params::Refresh,
    CountParts, DeleteByQueryParts, GetParts, IndexParts, SearchParts, UpdateByQueryParts,
};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::errors::StoreError;
use crate::interfaces::{IndexAdmin, UpgradeMarkerStore};
use crate::opensearch::client::{read_json, transport_error, OpenSearchClient};
use crate::opensearch::queries::{build_filter_query, build_update_script};
use crate::types::{AppliedStep, AppliedStepDocument, DocumentFilter, FieldUpdate};
use process_importer_shared::SchemaVersion;

/// Id of the metadata document holding the installed schema version.
const SCHEMA_VERSION_ID: &str = "schema-version";

/// Upper bound on applied-step markers read back in one request.
const MAX_APPLIED_STEPS: usize = 10_000;

/// Fail a by-query response that reports per-document failures.
fn check_by_query_failures(body: &Value, context: &str) -> Result<(), StoreError> {
    match body["failures"].as_array() {
        Some(failures) if !failures.is_empty() => Err(StoreError::request(
            500,
            format!("{} had {} failures: {}", context, failures.len(), failures[0]),
        )),
        _ => Ok(()),
    }
}

#[async_trait]
impl IndexAdmin for OpenSearchClient {
    async fn index_exists(&self, index: &str) -> Result<bool, StoreError> {
        let response = self
            .client
            .indices()
            .exists(IndicesExistsParts::Index(&[index]))
            .send()
            .await
            .map_err(transport_error)?;

        match response.status_code().as_u16() {
            200 => Ok(true),
            404 => Ok(false),
            status => Err(StoreError::request(status, format!("index exists check for {}", index))),
        }
    }

    async fn create_index(&self, index: &str, body: &Value) -> Result<(), StoreError> {
        let response = self
            .client
            .indices()
            .create(IndicesCreateParts::Index(index))
            .body(body.clone())
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status_code();
        if status.as_u16() == 400 {
            let error_body = response.text().await.unwrap_or_default();
            if error_body.contains("resource_already_exists_exception") {
                return Ok(());
            }
            return Err(StoreError::request(400, format!("create index {}: {}", index, error_body)));
        }

        read_json(response, "create index").await?;
        info!(index = %index, "Created index");
        Ok(())
    }

    async fn field_mapping(&self, index: &str, field: &str) -> Result<Option<Value>, StoreError> {
        let response = self
            .client
            .indices()
            .get_mapping(IndicesGetMappingParts::Index(&[index]))
            .send()
            .await
            .map_err(transport_error)?;

        if response.status_code().as_u16() == 404 {
            return Err(StoreError::not_found(format!("index {}", index)));
        }

        let body = read_json(response, "get mapping").await?;

        // The response is keyed by concrete index name, which differs from
        // `index` when it is an alias.
        let mapping = body
            .as_object()
            .and_then(|indices| indices.values().next())
            .and_then(|index_body| index_body["mappings"]["properties"].get(field))
            .cloned();

        Ok(mapping)
    }

    async fn put_field_mapping(
        &self,
        index: &str,
        field: &str,
        mapping: &Value,
    ) -> Result<(), StoreError> {
        let response = self
            .client
            .indices()
            .put_mapping(IndicesPutMappingParts::Index(&[index]))
            .body(json!({ "properties": { field: mapping } }))
            .send()
            .await
            .map_err(transport_error)?;

        read_json(response, "put mapping").await?;
        info!(index = %index, field = %field, "Updated field mapping");
        Ok(())
    }

    async fn count_documents(
        &self,
        index: &str,
        filter: &DocumentFilter,
    ) -> Result<u64, StoreError> {
        let response = self
            .client
            .count(CountParts::Index(&[index]))
            .body(json!({ "query": build_filter_query(filter) }))
            .send()
            .await
            .map_err(transport_error)?;

        let body = read_json(response, "count").await?;
        body["count"]
            .as_u64()
            .ok_or_else(|| StoreError::parse("count response without count"))
    }

    async fn update_documents(
        &self,
        index: &str,
        filter: &DocumentFilter,
        update: &FieldUpdate,
    ) -> Result<u64, StoreError> {
        let response = self
            .client
            .update_by_query(UpdateByQueryParts::Index(&[index]))
            .refresh(true)
            .body(json!({
                "query": build_filter_query(filter),
                "script": build_update_script(update)
            }))
            .send()
            .await
            .map_err(transport_error)?;

        let body = read_json(response, "update by query").await?;
        check_by_query_failures(&body, "update by query")?;
        Ok(body["updated"].as_u64().unwrap_or(0))
    }

    async fn delete_documents(
        &self,
        index: &str,
        filter: &DocumentFilter,
    ) -> Result<u64, StoreError> {
        let response = self
            .client
            .delete_by_query(DeleteByQueryParts::Index(&[index]))
            .refresh(true)
            .body(json!({ "query": build_filter_query(filter) }))
            .send()
            .await
            .map_err(transport_error)?;

        let body = read_json(response, "delete by query").await?;
        check_by_query_failures(&body, "delete by query")?;
        Ok(body["deleted"].as_u64().unwrap_or(0))
    }
}

#[async_trait]
impl UpgradeMarkerStore for OpenSearchClient {
    async fn applied_steps(&self) -> Result<Vec<AppliedStep>, StoreError> {
        let index_name = self.names.metadata();

        let response = self
            .client
            .search(SearchParts::Index(&[index_name.as_str()]))
            .ignore_unavailable(true)
            .body(json!({
                "size": MAX_APPLIED_STEPS,
                "query": { "term": { "type": "upgrade-step" } }
            }))
            .send()
            .await
            .map_err(transport_error)?;

        let body = read_json(response, "applied steps").await?;
        let hits = body["hits"]["hits"].as_array().cloned().unwrap_or_default();

        let mut steps = Vec::with_capacity(hits.len());
        for hit in hits {
            let document: AppliedStepDocument = serde_json::from_value(hit["_source"].clone())
                .map_err(|e| StoreError::parse(format!("applied step marker: {}", e)))?;
            steps.push(AppliedStep::new(document.version, document.step_index));
        }

        if steps.len() == MAX_APPLIED_STEPS {
            warn!(count = steps.len(), "Applied step markers may be truncated");
        }

        steps.sort();
        Ok(steps)
    }

    async fn record_applied_step(&self, step: &AppliedStep) -> Result<(), StoreError> {
        let index_name = self.names.metadata();
        let marker_id = step.marker_id();
        let document = AppliedStepDocument {
            kind: "upgrade-step".to_string(),
            version: step.version,
            step_index: step.step_index,
            applied_at: Utc::now(),
        };
        let body = serde_json::to_value(&document)
            .map_err(|e| StoreError::parse(format!("applied step marker: {}", e)))?;

        // Refresh so the next `applied_steps` search sees the marker.
        let response = self
            .client
            .index(IndexParts::IndexId(&index_name, &marker_id))
            .refresh(Refresh::True)
            .body(body)
            .send()
            .await
            .map_err(transport_error)?;

        read_json(response, "record applied step").await?;
        Ok(())
    }

    async fn installed_version(&self) -> Result<Option<SchemaVersion>, StoreError> {
        let index_name = self.names.metadata();

        let response = self
            .client
            .get(GetParts::IndexId(&index_name, SCHEMA_VERSION_ID))
            .send()
            .await
            .map_err(transport_error)?;

        if response.status_code().as_u16() == 404 {
            return Ok(None);
        }

        let body = read_json(response, "installed version").await?;
        let version = body["_source"]["version"]
            .as_str()
            .ok_or_else(|| StoreError::parse("schema version document without version"))?;

        version
            .parse()
            .map(Some)
            .map_err(|e| StoreError::parse(format!("schema version: {}", e)))
    }

    async fn set_installed_version(&self, version: SchemaVersion) -> Result<(), StoreError> {
        let index_name = self.names.metadata();

        let response = self
            .client
            .index(IndexParts::IndexId(&index_name, SCHEMA_VERSION_ID))
            .refresh(Refresh::True)
            .body(json!({
                "type": SCHEMA_VERSION_ID,
                "version": version.to_string()
            }))
            .send()
            .await
            .map_err(transport_error)?;

        read_json(response, "set installed version").await?;
        info!(version = %version, "Recorded installed schema version");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_by_query_failures_are_errors() {
        assert!(check_by_query_failures(&json!({ "updated": 3, "failures": [] }), "update").is_ok());
        assert!(check_by_query_failures(&json!({ "updated": 3 }), "update").is_ok());

        let failed = json!({ "updated": 1, "failures": [ { "cause": { "type": "version_conflict" } } ] });
        assert!(check_by_query_failures(&failed, "update").is_err());
    }
}

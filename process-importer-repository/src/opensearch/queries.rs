//! OpenSearch request builders.
//!
//! This module builds the request bodies the OpenSearch client sends: the
//! record page query against exporter indices, bulk action lines for document
//! mutations, and filter/script bodies for by-query administration.

use serde_json::{json, Value};

use crate::types::{DocumentFilter, FieldUpdate};
use process_importer_shared::{DocumentMutation, MutationOperation, PartitionId, Position, RecordType};

/// Build the query reading one page of exporter records.
///
/// Only `EVENT` records are imported; commands and rejections never change
/// process state.
pub fn build_record_page_query(
    partition_id: PartitionId,
    record_type: RecordType,
    after: Position,
    max_count: usize,
) -> Value {
    json!({
        "size": max_count,
        "sort": [
            { "position": { "order": "asc" } }
        ],
        "query": {
            "bool": {
                "filter": [
                    { "term": { "partitionId": partition_id.0 } },
                    { "term": { "recordType": "EVENT" } },
                    { "term": { "valueType": record_type.value_type() } },
                    { "range": { "position": { "gt": after.value() } } }
                ]
            }
        }
    })
}

/// Build the two bulk lines (action and source) for one mutation.
///
/// Deletes have no source line, so the second element is `None`.
pub fn build_bulk_lines(index_name: &str, mutation: &DocumentMutation) -> (Value, Option<Value>) {
    let target = json!({ "_index": index_name, "_id": mutation.document_id });

    match mutation.operation {
        MutationOperation::Upsert => (
            json!({ "update": target }),
            Some(json!({ "doc": mutation.fields, "doc_as_upsert": true })),
        ),
        MutationOperation::PartialUpdate => (
            json!({ "update": target }),
            Some(json!({ "doc": mutation.fields })),
        ),
        MutationOperation::Delete => (json!({ "delete": target }), None),
    }
}

/// Translate a document filter into query DSL.
pub fn build_filter_query(filter: &DocumentFilter) -> Value {
    match filter {
        DocumentFilter::All => json!({ "match_all": {} }),
        DocumentFilter::FieldMissing(field) => json!({
            "bool": {
                "must_not": [
                    { "exists": { "field": field } }
                ]
            }
        }),
        DocumentFilter::FieldExists(field) => json!({ "exists": { "field": field } }),
        DocumentFilter::FieldEquals(field, value) => json!({ "term": { field.as_str(): value } }),
    }
}

/// Translate a field update into a painless script.
pub fn build_update_script(update: &FieldUpdate) -> Value {
    match update {
        FieldUpdate::Set { field, value } => json!({
            "lang": "painless",
            "source": "ctx._source[params.field] = params.value",
            "params": { "field": field, "value": value }
        }),
        FieldUpdate::Remove { field } => json!({
            "lang": "painless",
            "source": "ctx._source.remove(params.field)",
            "params": { "field": field }
        }),
    }
}

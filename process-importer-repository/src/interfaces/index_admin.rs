//! Index administration trait definition.

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::StoreError;
use crate::types::{DocumentFilter, FieldUpdate};

/// Mapping and by-query access used by schema bootstrap and upgrade steps.
///
/// Indices are addressed by physical name.
#[async_trait]
pub trait IndexAdmin: Send + Sync {
    async fn index_exists(&self, index: &str) -> Result<bool, StoreError>;

    /// Create an index with the given settings and mappings. Creating an index
    /// that already exists succeeds without changing it.
    async fn create_index(&self, index: &str, body: &Value) -> Result<(), StoreError>;

    /// The mapping of one top-level field, `None` if the field is unmapped.
    async fn field_mapping(&self, index: &str, field: &str) -> Result<Option<Value>, StoreError>;

    /// Add or extend the mapping of one top-level field.
    async fn put_field_mapping(
        &self,
        index: &str,
        field: &str,
        mapping: &Value,
    ) -> Result<(), StoreError>;

    async fn count_documents(&self, index: &str, filter: &DocumentFilter)
        -> Result<u64, StoreError>;

    /// Apply an update to every matching document. Returns the number updated.
    async fn update_documents(
        &self,
        index: &str,
        filter: &DocumentFilter,
        update: &FieldUpdate,
    ) -> Result<u64, StoreError>;

    /// Delete every matching document. Returns the number deleted.
    async fn delete_documents(&self, index: &str, filter: &DocumentFilter)
        -> Result<u64, StoreError>;
}

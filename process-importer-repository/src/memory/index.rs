//! In-memory search index.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::config::IndexNames;
use crate::errors::{StoreError, WriteFailure};
use crate::interfaces::{CursorStore, DocumentStore, IndexAdmin, UpgradeMarkerStore};
use crate::types::{AppliedStep, BulkItemResult, DocumentFilter, FieldUpdate};
use process_importer_shared::{
    DocumentIndex, DocumentKey, DocumentMutation, Fields, ImportCursor, ImportPair,
    MutationOperation, SchemaVersion,
};

/// Mappings and documents of one index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexContents {
    /// Top-level field mappings (`mappings.properties`).
    pub mappings: Fields,
    pub documents: BTreeMap<String, Fields>,
}

/// Every index by physical name.
pub type IndexSnapshot = BTreeMap<String, IndexContents>;

#[derive(Debug)]
struct InjectedFailure {
    failure: WriteFailure,
    remaining: Option<usize>,
}

#[derive(Debug, Default)]
struct State {
    indices: IndexSnapshot,
    cursors: HashMap<ImportPair, ImportCursor>,
    applied_steps: BTreeSet<AppliedStep>,
    installed_version: Option<SchemaVersion>,
    injected_failures: HashMap<DocumentKey, InjectedFailure>,
    bulk_errors: VecDeque<StoreError>,
    cursor_errors: VecDeque<StoreError>,
    applied_log: Vec<(DocumentKey, MutationOperation)>,
    bulk_requests: usize,
}

impl State {
    fn index(&self, name: &str) -> Result<&IndexContents, StoreError> {
        self.indices
            .get(name)
            .ok_or_else(|| StoreError::not_found(format!("index {}", name)))
    }

    fn index_mut(&mut self, name: &str) -> Result<&mut IndexContents, StoreError> {
        self.indices
            .get_mut(name)
            .ok_or_else(|| StoreError::not_found(format!("index {}", name)))
    }

    /// Consume an injected failure for the key, if one is armed.
    fn take_failure(&mut self, key: &DocumentKey) -> Option<WriteFailure> {
        let injected = self.injected_failures.get_mut(key)?;
        match injected.remaining {
            Some(0) => None,
            Some(ref mut remaining) => {
                *remaining -= 1;
                Some(injected.failure.clone())
            }
            None => Some(injected.failure.clone()),
        }
    }
}

/// A search index held in memory.
///
/// Implements every storage interface except `RecordSource`, so one instance
/// can stand in for the whole OpenSearch cluster.
#[derive(Debug, Default)]
pub struct InMemoryIndex {
    names: IndexNames,
    state: Mutex<State>,
}

impl InMemoryIndex {
    /// Create an empty index store using the default index names.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty index store using the given index names.
    pub fn with_names(names: IndexNames) -> Self {
        Self {
            names,
            state: Mutex::new(State::default()),
        }
    }

    pub fn names(&self) -> &IndexNames {
        &self.names
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fail every write of the document with `failure` until cleared.
    pub fn fail_document(&self, key: DocumentKey, failure: WriteFailure) {
        self.state().injected_failures.insert(
            key,
            InjectedFailure {
                failure,
                remaining: None,
            },
        );
    }

    /// Fail the next `times` writes of the document with `failure`.
    pub fn fail_document_times(&self, key: DocumentKey, failure: WriteFailure, times: usize) {
        self.state().injected_failures.insert(
            key,
            InjectedFailure {
                failure,
                remaining: Some(times),
            },
        );
    }

    /// Remove every injected per-document failure.
    pub fn clear_failures(&self) {
        self.state().injected_failures.clear();
    }

    /// Make the next bulk request fail as a whole.
    pub fn fail_next_bulk(&self, error: StoreError) {
        self.state().bulk_errors.push_back(error);
    }

    /// Make the next cursor write fail.
    pub fn fail_next_cursor_write(&self, error: StoreError) {
        self.state().cursor_errors.push_back(error);
    }

    /// Store a document directly, bypassing the bulk path. Creates the index
    /// if needed.
    pub fn insert_document(&self, index: &str, id: &str, fields: Fields) {
        self.state()
            .indices
            .entry(index.to_string())
            .or_default()
            .documents
            .insert(id.to_string(), fields);
    }

    /// A document of an importer index.
    pub fn document(&self, key: &DocumentKey) -> Option<Fields> {
        let name = self.names.document_index(key.index);
        self.state()
            .indices
            .get(&name)
            .and_then(|contents| contents.documents.get(&key.id).cloned())
    }

    /// Every document of an importer index.
    pub fn documents(&self, index: DocumentIndex) -> BTreeMap<String, Fields> {
        let name = self.names.document_index(index);
        self.state()
            .indices
            .get(&name)
            .map(|contents| contents.documents.clone())
            .unwrap_or_default()
    }

    /// Copy of every index's mappings and documents.
    pub fn snapshot(&self) -> IndexSnapshot {
        self.state().indices.clone()
    }

    /// The cursor stored for a pair, if any.
    pub fn stored_cursor(&self, pair: ImportPair) -> Option<ImportCursor> {
        self.state().cursors.get(&pair).cloned()
    }

    /// Every applied item so far, in application order.
    pub fn applied_log(&self) -> Vec<(DocumentKey, MutationOperation)> {
        self.state().applied_log.clone()
    }

    /// Number of bulk requests received, including failed ones.
    pub fn bulk_request_count(&self) -> usize {
        self.state().bulk_requests
    }
}

/// Reject fields the index does not map. Indices created lazily by a write
/// have no mappings and accept anything.
fn check_strict_mapping(contents: &IndexContents, mutation: &DocumentMutation) -> Result<(), WriteFailure> {
    if contents.mappings.is_empty() {
        return Ok(());
    }
    match mutation
        .fields
        .keys()
        .find(|field| !contents.mappings.contains_key(field.as_str()))
    {
        Some(field) => Err(WriteFailure::permanent(format!(
            "strict_dynamic_mapping_exception: mapping set to strict, dynamic introduction of [{}] is not allowed",
            field
        ))),
        None => Ok(()),
    }
}

/// Apply one mutation to an index's documents.
fn apply_mutation(contents: &mut IndexContents, mutation: &DocumentMutation) -> Result<(), WriteFailure> {
    check_strict_mapping(contents, mutation)?;
    match mutation.operation {
        MutationOperation::Upsert => {
            let document = contents
                .documents
                .entry(mutation.document_id.clone())
                .or_default();
            for (field, value) in &mutation.fields {
                document.insert(field.clone(), value.clone());
            }
            Ok(())
        }
        MutationOperation::PartialUpdate => {
            let document = contents
                .documents
                .get_mut(&mutation.document_id)
                .ok_or_else(|| {
                    WriteFailure::permanent(format!(
                        "document_missing_exception: [{}]: document missing",
                        mutation.document_id
                    ))
                })?;
            for (field, value) in &mutation.fields {
                document.insert(field.clone(), value.clone());
            }
            Ok(())
        }
        MutationOperation::Delete => {
            contents.documents.remove(&mutation.document_id);
            Ok(())
        }
    }
}

#[async_trait]
impl DocumentStore for InMemoryIndex {
    async fn bulk_apply(
        &self,
        mutations: &[DocumentMutation],
    ) -> Result<Vec<BulkItemResult>, StoreError> {
        let mut state = self.state();
        state.bulk_requests += 1;

        if let Some(error) = state.bulk_errors.pop_front() {
            return Err(error);
        }

        let mut results = Vec::with_capacity(mutations.len());
        for mutation in mutations {
            let key = mutation.key();

            if let Some(failure) = state.take_failure(&key) {
                results.push(BulkItemResult::failed(key, failure));
                continue;
            }

            let name = self.names.document_index(mutation.index);
            let contents = state.indices.entry(name).or_default();
            match apply_mutation(contents, mutation) {
                Ok(()) => {
                    state.applied_log.push((key.clone(), mutation.operation));
                    results.push(BulkItemResult::applied(key));
                }
                Err(failure) => results.push(BulkItemResult::failed(key, failure)),
            }
        }

        Ok(results)
    }

    async fn health_check(&self) -> Result<bool, StoreError> {
        Ok(true)
    }
}

#[async_trait]
impl CursorStore for InMemoryIndex {
    async fn load_cursor(&self, pair: ImportPair) -> Result<ImportCursor, StoreError> {
        Ok(self
            .state()
            .cursors
            .get(&pair)
            .cloned()
            .unwrap_or_else(|| ImportCursor::initial(pair)))
    }

    async fn store_cursor(&self, cursor: &ImportCursor) -> Result<(), StoreError> {
        let mut state = self.state();
        if let Some(error) = state.cursor_errors.pop_front() {
            return Err(error);
        }
        state.cursors.insert(cursor.pair(), cursor.clone());
        Ok(())
    }

    async fn reset_cursor(&self, pair: ImportPair) -> Result<(), StoreError> {
        self.state().cursors.remove(&pair);
        Ok(())
    }
}

#[async_trait]
impl IndexAdmin for InMemoryIndex {
    async fn index_exists(&self, index: &str) -> Result<bool, StoreError> {
        Ok(self.state().indices.contains_key(index))
    }

    async fn create_index(&self, index: &str, body: &Value) -> Result<(), StoreError> {
        let mut state = self.state();
        if state.indices.contains_key(index) {
            return Ok(());
        }

        let mappings = body["mappings"]["properties"]
            .as_object()
            .cloned()
            .unwrap_or_default();
        state.indices.insert(
            index.to_string(),
            IndexContents {
                mappings,
                documents: BTreeMap::new(),
            },
        );
        Ok(())
    }

    async fn field_mapping(&self, index: &str, field: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.state().index(index)?.mappings.get(field).cloned())
    }

    async fn put_field_mapping(
        &self,
        index: &str,
        field: &str,
        mapping: &Value,
    ) -> Result<(), StoreError> {
        let mut state = self.state();
        let contents = state.index_mut(index)?;

        match contents.mappings.get(field) {
            Some(existing) if existing != mapping => Err(StoreError::request(
                400,
                format!(
                    "illegal_argument_exception: mapper [{}] cannot be changed from {} to {}",
                    field, existing, mapping
                ),
            )),
            _ => {
                contents.mappings.insert(field.to_string(), mapping.clone());
                Ok(())
            }
        }
    }

    async fn count_documents(
        &self,
        index: &str,
        filter: &DocumentFilter,
    ) -> Result<u64, StoreError> {
        let state = self.state();
        let count = state
            .index(index)?
            .documents
            .values()
            .filter(|document| filter.matches(document))
            .count();
        Ok(count as u64)
    }

    async fn update_documents(
        &self,
        index: &str,
        filter: &DocumentFilter,
        update: &FieldUpdate,
    ) -> Result<u64, StoreError> {
        let mut state = self.state();
        let mut updated = 0;
        for document in state.index_mut(index)?.documents.values_mut() {
            if filter.matches(document) {
                update.apply(document);
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn delete_documents(
        &self,
        index: &str,
        filter: &DocumentFilter,
    ) -> Result<u64, StoreError> {
        let mut state = self.state();
        let documents = &mut state.index_mut(index)?.documents;
        let before = documents.len();
        documents.retain(|_, document| !filter.matches(document));
        Ok((before - documents.len()) as u64)
    }
}

#[async_trait]
impl UpgradeMarkerStore for InMemoryIndex {
    async fn applied_steps(&self) -> Result<Vec<AppliedStep>, StoreError> {
        Ok(self.state().applied_steps.iter().cloned().collect())
    }

    async fn record_applied_step(&self, step: &AppliedStep) -> Result<(), StoreError> {
        self.state().applied_steps.insert(step.clone());
        Ok(())
    }

    async fn installed_version(&self) -> Result<Option<SchemaVersion>, StoreError> {
        Ok(self.state().installed_version)
    }

    async fn set_installed_version(&self, version: SchemaVersion) -> Result<(), StoreError> {
        self.state().installed_version = Some(version);
        Ok(())
    }
}

//! Batch writer for the import pipeline.
//!
//! Applies the mutations of one page to the search index as bulk requests and
//! reports the outcome per document.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, instrument, warn};

use crate::errors::ImportError;
use process_importer_repository::{DocumentStore, StoreError, WriteFailure};
use process_importer_shared::{DocumentKey, DocumentMutation};

/// Configuration for the batch writer.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Retries of transiently failed documents after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry (in milliseconds).
    pub initial_retry_delay_ms: u64,
    /// Upper bound on the delay between retries (in milliseconds).
    pub max_retry_delay_ms: u64,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_retry_delay_ms: 100,
            max_retry_delay_ms: 5000,
        }
    }
}

/// Outcome of applying a batch, per document.
///
/// A document is in `succeeded` only if every mutation addressing it was
/// applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchResult {
    pub succeeded: BTreeSet<DocumentKey>,
    pub failed: BTreeMap<DocumentKey, WriteFailure>,
}

impl BatchResult {
    /// Whether every document of the batch was written.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// The first failed document in key order, if any.
    pub fn first_failure(&self) -> Option<(&DocumentKey, &WriteFailure)> {
        self.failed.iter().next()
    }
}

/// Writer that applies document mutations with bounded retries.
pub struct BatchWriter {
    store: Arc<dyn DocumentStore>,
    config: WriterConfig,
}

impl BatchWriter {
    /// Create a new batch writer with the given store.
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            config: WriterConfig::default(),
        }
    }

    /// Create a new batch writer with custom configuration.
    pub fn with_config(store: Arc<dyn DocumentStore>, config: WriterConfig) -> Self {
        Self { store, config }
    }

    /// Apply mutations in order.
    ///
    /// Mutations are sent as one bulk request. Documents that fail
    /// transiently are retried with exponential backoff; the retried
    /// sub-batch keeps the original order and starts at the first failed
    /// mutation, so a later mutation of a document is never left applied
    /// before an earlier one. Permanent failures are not retried.
    ///
    /// # Returns
    ///
    /// * `Ok(BatchResult)` - Per-document outcome, possibly with failures
    /// * `Err(ImportError::Write)` - A bulk request failed as a whole
    #[instrument(skip(self, mutations), fields(count = mutations.len()))]
    pub async fn apply(&self, mutations: &[DocumentMutation]) -> Result<BatchResult, ImportError> {
        let mut result = BatchResult::default();
        if mutations.is_empty() {
            return Ok(result);
        }

        let mut pending: Vec<DocumentMutation> = mutations.to_vec();
        let mut attempt: u32 = 0;
        let mut delay_ms = self.config.initial_retry_delay_ms;

        loop {
            let items = self
                .store
                .bulk_apply(&pending)
                .await
                .map_err(ImportError::Write)?;

            if items.len() != pending.len() {
                return Err(ImportError::Write(StoreError::parse(format!(
                    "{} results for {} mutations",
                    items.len(),
                    pending.len()
                ))));
            }

            let mut transient: BTreeMap<DocumentKey, WriteFailure> = BTreeMap::new();
            let mut first_transient: Option<usize> = None;

            for (index, (mutation, item)) in pending.iter().zip(&items).enumerate() {
                let key = mutation.key();
                match &item.outcome {
                    Ok(()) => {}
                    Err(failure) if failure.is_transient() => {
                        first_transient.get_or_insert(index);
                        transient.entry(key).or_insert_with(|| failure.clone());
                    }
                    Err(failure) => {
                        error!(
                            document = %key,
                            reason = %failure.reason(),
                            "Permanent write failure"
                        );
                        result.failed.entry(key).or_insert_with(|| failure.clone());
                    }
                }
            }

            for mutation in &pending {
                let key = mutation.key();
                if !transient.contains_key(&key) && !result.failed.contains_key(&key) {
                    result.succeeded.insert(key);
                }
            }

            let Some(first) = first_transient else {
                break;
            };

            // Permanently failed documents stay failed even if they also
            // failed transiently elsewhere in the batch.
            transient.retain(|key, _| !result.failed.contains_key(key));
            if transient.is_empty() {
                break;
            }

            if attempt >= self.config.max_retries {
                warn!(
                    attempts = attempt + 1,
                    documents = transient.len(),
                    "Giving up on transiently failed documents"
                );
                result.failed.extend(transient);
                break;
            }

            attempt += 1;
            pending = pending[first..]
                .iter()
                .filter(|mutation| transient.contains_key(&mutation.key()))
                .cloned()
                .collect();

            warn!(
                attempt = attempt,
                delay_ms = delay_ms,
                documents = transient.len(),
                mutations = pending.len(),
                "Retrying transiently failed documents"
            );

            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            delay_ms = std::cmp::min(delay_ms.saturating_mul(2), self.config.max_retry_delay_ms);
        }

        // A document that succeeded in an early round but failed later is
        // failed.
        for key in result.failed.keys() {
            result.succeeded.remove(key);
        }

        debug!(
            succeeded = result.succeeded.len(),
            failed = result.failed.len(),
            "Batch applied"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use process_importer_repository::{BulkItemResult, InMemoryIndex};
    use process_importer_shared::{DocumentIndex, MutationOperation};
    use serde_json::json;
    use std::sync::Mutex;

    fn instance(id: &str) -> DocumentKey {
        DocumentKey::new(DocumentIndex::ProcessInstance, id)
    }

    fn upsert(id: &str, state: &str) -> DocumentMutation {
        DocumentMutation::upsert(DocumentIndex::ProcessInstance, id).with_field("state", state)
    }

    fn fast_config() -> WriterConfig {
        WriterConfig {
            max_retries: 2,
            initial_retry_delay_ms: 10,
            max_retry_delay_ms: 20,
        }
    }

    /// Mock store recording every bulk request it receives.
    struct RecordingStore {
        inner: InMemoryIndex,
        requests: Mutex<Vec<Vec<(String, String)>>>,
    }

    impl RecordingStore {
        fn new() -> Self {
            Self {
                inner: InMemoryIndex::new(),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn requests(&self) -> Vec<Vec<(String, String)>> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DocumentStore for RecordingStore {
        async fn bulk_apply(
            &self,
            mutations: &[DocumentMutation],
        ) -> Result<Vec<BulkItemResult>, StoreError> {
            self.requests.lock().unwrap().push(
                mutations
                    .iter()
                    .map(|m| {
                        (
                            m.document_id.clone(),
                            m.fields["state"].as_str().unwrap_or_default().to_string(),
                        )
                    })
                    .collect(),
            );
            self.inner.bulk_apply(mutations).await
        }

        async fn health_check(&self) -> Result<bool, StoreError> {
            Ok(true)
        }
    }

    #[tokio::test]
    async fn test_apply_all_succeed() {
        let store = Arc::new(InMemoryIndex::new());
        let writer = BatchWriter::new(store.clone());

        let result = writer
            .apply(&[upsert("1", "ACTIVE"), upsert("2", "ACTIVE"), upsert("1", "COMPLETED")])
            .await
            .unwrap();

        assert!(result.is_complete());
        assert_eq!(result.succeeded.len(), 2);
        assert_eq!(store.document(&instance("1")).unwrap()["state"], json!("COMPLETED"));
        assert_eq!(store.bulk_request_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_batch_sends_nothing() {
        let store = Arc::new(InMemoryIndex::new());
        let writer = BatchWriter::new(store.clone());

        let result = writer.apply(&[]).await.unwrap();
        assert!(result.is_complete());
        assert_eq!(store.bulk_request_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failure_is_retried_in_order() {
        let store = Arc::new(RecordingStore::new());
        store
            .inner
            .fail_document_times(instance("1"), WriteFailure::transient("429 throttled"), 1);
        let writer = BatchWriter::with_config(store.clone(), fast_config());

        let result = writer
            .apply(&[
                upsert("2", "ACTIVE"),
                upsert("1", "ACTIVE"),
                upsert("3", "ACTIVE"),
                upsert("1", "COMPLETED"),
            ])
            .await
            .unwrap();

        assert!(result.is_complete());
        assert_eq!(result.succeeded.len(), 3);

        // The first request applied "1" -> COMPLETED after "1" -> ACTIVE
        // failed; the retry re-sends both, in order.
        let requests = store.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(
            requests[1],
            vec![
                ("1".to_string(), "ACTIVE".to_string()),
                ("1".to_string(), "COMPLETED".to_string()),
            ]
        );
        assert_eq!(
            store.inner.document(&instance("1")).unwrap()["state"],
            json!("COMPLETED")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failure_exhausts_retries() {
        let store = Arc::new(InMemoryIndex::new());
        store.fail_document(instance("1"), WriteFailure::transient("503 unavailable"));
        let writer = BatchWriter::with_config(store.clone(), fast_config());

        let result = writer
            .apply(&[upsert("1", "ACTIVE"), upsert("2", "ACTIVE")])
            .await
            .unwrap();

        assert!(!result.is_complete());
        assert!(result.failed[&instance("1")].is_transient());
        assert!(result.succeeded.contains(&instance("2")));
        assert_eq!(store.bulk_request_count(), 3);
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_retried() {
        let store = Arc::new(InMemoryIndex::new());
        let writer = BatchWriter::with_config(store.clone(), fast_config());

        let resolve_missing = DocumentMutation::partial_update(DocumentIndex::Incident, "9")
            .with_field("state", "RESOLVED");

        let result = writer
            .apply(&[upsert("1", "ACTIVE"), resolve_missing, upsert("3", "ACTIVE")])
            .await
            .unwrap();

        assert_eq!(result.failed.len(), 1);
        let (key, failure) = result.first_failure().unwrap();
        assert_eq!(key, &DocumentKey::new(DocumentIndex::Incident, "9"));
        assert!(!failure.is_transient());
        assert_eq!(result.succeeded.len(), 2);
        assert_eq!(store.bulk_request_count(), 1);
    }

    #[tokio::test]
    async fn test_request_failure_is_write_error() {
        let store = Arc::new(InMemoryIndex::new());
        store.fail_next_bulk(StoreError::connection("connection reset"));
        let writer = BatchWriter::new(store.clone());

        let err = writer.apply(&[upsert("1", "ACTIVE")]).await.unwrap_err();
        assert!(matches!(err, ImportError::Write(_)));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_delete_of_missing_document_succeeds() {
        let store = Arc::new(InMemoryIndex::new());
        let writer = BatchWriter::new(store.clone());

        let delete = DocumentMutation::delete(DocumentIndex::ProcessDefinition, "4");
        let result = writer.apply(&[delete]).await.unwrap();

        assert!(result.is_complete());
        assert_eq!(
            store.applied_log(),
            vec![(
                DocumentKey::new(DocumentIndex::ProcessDefinition, "4"),
                MutationOperation::Delete
            )]
        );
    }
}

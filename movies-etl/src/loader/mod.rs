//! Loader module for the movies ETL.
//!
//! Writes documents into the search index with bulk upserts keyed by
//! document id.

use std::sync::Arc;
use tracing::{debug, error, instrument, warn};

use crate::errors::LoaderError;
use crate::retry::RetryPolicy;
use movies_etl_repository::{
    BatchOperationSummary, SearchIndexConfig, SearchIndexProvider, UpsertDocumentRequest,
};
use movies_etl_shared::{EntityKind, IndexDocument};

/// Loader that indexes documents into the search engine.
///
/// The loader is responsible for:
/// - Routing each entity kind to its index
/// - Splitting large loads into bulk requests of at most `max_batch_size`
/// - Retrying requests that fail for transient reasons
/// - Turning a partially applied bulk request into an error
pub struct SearchLoader {
    provider: Arc<dyn SearchIndexProvider>,
    config: SearchIndexConfig,
    retry: RetryPolicy,
}

impl SearchLoader {
    /// Create a new search loader with the default index names.
    pub fn new(provider: Arc<dyn SearchIndexProvider>, retry: RetryPolicy) -> Self {
        Self::with_config(provider, SearchIndexConfig::default(), retry)
    }

    /// Create a new search loader with custom configuration.
    pub fn with_config(
        provider: Arc<dyn SearchIndexProvider>,
        config: SearchIndexConfig,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            provider,
            config,
            retry,
        }
    }

    /// The index name documents of `kind` are written to.
    pub fn index_for(&self, kind: EntityKind) -> &str {
        self.config.index_for(kind)
    }

    /// Replace the documents of `kind` in their index.
    ///
    /// Writing the same documents again leaves the index unchanged. An empty
    /// slice makes no request.
    ///
    /// # Returns
    ///
    /// * `Ok(usize)` - Number of documents written
    /// * `Err(LoaderError)` - If any bulk request failed, or any document in
    ///   it was rejected
    #[instrument(skip(self, documents), fields(count = documents.len()))]
    pub async fn upsert<D: IndexDocument>(
        &self,
        kind: EntityKind,
        documents: &[D],
    ) -> Result<usize, LoaderError> {
        if documents.is_empty() {
            return Ok(0);
        }

        let requests = documents
            .iter()
            .map(|document| {
                Ok(UpsertDocumentRequest {
                    document_id: document.document_id(),
                    body: serde_json::to_value(document)?,
                })
            })
            .collect::<Result<Vec<_>, serde_json::Error>>()?;

        let index = self.index_for(kind);
        for chunk in requests.chunks(self.config.max_batch_size.max(1)) {
            self.flush(index, chunk).await?;
        }

        Ok(requests.len())
    }

    /// Send one bulk request, retrying transient failures.
    async fn flush(
        &self,
        index: &str,
        requests: &[UpsertDocumentRequest],
    ) -> Result<(), LoaderError> {
        debug!(index = %index, count = requests.len(), "Flushing documents to search index");

        let summary = self
            .retry
            .run("bulk_upsert", || async {
                let summary = self
                    .provider
                    .bulk_upsert_documents(index, requests)
                    .await?;
                Self::ensure_complete(index, summary)
            })
            .await?;

        debug!(index = %index, count = summary.succeeded, "Successfully indexed all documents");
        Ok(())
    }

    /// Fail on any rejected document, logging each rejection.
    fn ensure_complete(
        index: &str,
        summary: BatchOperationSummary,
    ) -> Result<BatchOperationSummary, LoaderError> {
        if summary.failed == 0 {
            return Ok(summary);
        }

        warn!(
            index = %index,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Bulk upsert completed with some failures"
        );
        for result in summary.results.iter().filter(|r| !r.success) {
            if let Some(ref err) = result.error {
                error!(
                    index = %index,
                    document_id = %result.document_id,
                    error = %err,
                    "Failed to index document"
                );
            }
        }

        Err(LoaderError::partial(index, summary.failed, summary.total))
    }
}

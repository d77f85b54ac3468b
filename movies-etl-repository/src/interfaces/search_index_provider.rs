//! Search index provider trait definition.
//!
//! This module defines the abstract interface for search index writes,
//! allowing for different backend implementations (OpenSearch, Elasticsearch, etc.).

use async_trait::async_trait;

use crate::errors::SearchIndexError;
use crate::types::{BatchOperationSummary, UpsertDocumentRequest};

/// Abstracts the underlying search index implementation (OpenSearch, Elasticsearch, etc.).
///
/// # Note on Document Creation
///
/// There is no separate create or partial update: every write is a full
/// replace keyed by document id. Writing the same request twice leaves the
/// index in the same state as writing it once, which is what makes replaying
/// a failed synchronization cycle safe.
///
/// # Index Provisioning
///
/// Indexes and their mappings are created outside the ETL. Implementations
/// must not create or alter them.
#[async_trait]
pub trait SearchIndexProvider: Send + Sync {
    /// Write documents into `index` in a single bulk request.
    ///
    /// # Arguments
    ///
    /// * `index` - Name of the target index
    /// * `requests` - Documents to write, each under its own id
    ///
    /// # Returns
    ///
    /// * `Ok(BatchOperationSummary)` - The request was accepted; per-document
    ///   outcomes are in the summary and some of them may have failed
    /// * `Err(SearchIndexError)` - The request as a whole failed
    async fn bulk_upsert_documents(
        &self,
        index: &str,
        requests: &[UpsertDocumentRequest],
    ) -> Result<BatchOperationSummary, SearchIndexError>;
}

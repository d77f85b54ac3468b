//! Request and response types for search index operations.

use serde_json::Value;

use crate::errors::SearchIndexError;

/// Request to write one complete document into an index.
///
/// The document is stored under `document_id`, replacing any previous
/// document with the same id.
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertDocumentRequest {
    /// The id the document is stored under.
    pub document_id: String,
    /// The full document source.
    pub body: Value,
}

/// Result of a batch operation for a single item.
///
/// This struct represents the outcome of writing one document within a bulk
/// request. It indicates whether the write succeeded and includes error
/// details if it failed.
#[derive(Debug, Clone)]
pub struct BatchOperationResult {
    /// The document's id in the index.
    pub document_id: String,
    /// Whether the operation succeeded.
    pub success: bool,
    /// Error if the operation failed.
    pub error: Option<SearchIndexError>,
}

/// Summary of a batch operation containing aggregate statistics and individual results.
///
/// The bulk API accepts a request even when some of its items fail, so
/// callers must check `failed` rather than rely on the call returning `Ok`.
#[derive(Debug, Clone)]
pub struct BatchOperationSummary {
    /// Total number of items in the batch.
    pub total: usize,
    /// Number of successful operations.
    pub succeeded: usize,
    /// Number of failed operations.
    pub failed: usize,
    /// Individual results for each item.
    pub results: Vec<BatchOperationResult>,
}

impl BatchOperationSummary {
    /// Build a summary from per-item results.
    pub fn from_results(results: Vec<BatchOperationResult>) -> Self {
        let succeeded = results.iter().filter(|r| r.success).count();
        Self {
            total: results.len(),
            succeeded,
            failed: results.len() - succeeded,
            results,
        }
    }

    /// Whether every item in the batch was written.
    pub fn is_complete(&self) -> bool {
        self.failed == 0 && self.succeeded == self.total
    }
}

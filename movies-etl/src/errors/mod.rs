//! Error types for the movies ETL pipeline.

use thiserror::Error;

use movies_etl_repository::{ContentRepositoryError, CursorStoreError, SearchIndexError};

/// Errors that can occur while writing documents to the search index.
#[derive(Error, Debug)]
pub enum LoaderError {
    /// The search index rejected or could not receive a bulk request.
    #[error("Search index error: {0}")]
    Index(#[from] SearchIndexError),

    /// A document could not be serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The bulk request was accepted but some documents were not written.
    #[error("Bulk write to '{index}' failed for {failed} of {total} documents")]
    PartialBulkFailure {
        index: String,
        failed: usize,
        total: usize,
    },
}

impl LoaderError {
    /// Create a partial bulk failure error.
    pub fn partial(index: impl Into<String>, failed: usize, total: usize) -> Self {
        Self::PartialBulkFailure {
            index: index.into(),
            failed,
            total,
        }
    }
}

/// Errors that abort a synchronization cycle.
///
/// The cursor of the failed kind is never advanced when one of these is
/// returned.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Reading from the content database failed.
    #[error("Extract error: {0}")]
    Extract(#[from] ContentRepositoryError),

    /// Writing to the search index failed.
    #[error("Load error: {0}")]
    Load(#[from] LoaderError),

    /// The new cursor value could not be persisted.
    #[error("Cursor error: {0}")]
    Cursor(#[from] CursorStoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_failure_message() {
        let err = LoaderError::partial("movies", 2, 10);
        assert_eq!(
            err.to_string(),
            "Bulk write to 'movies' failed for 2 of 10 documents"
        );
    }

    #[test]
    fn test_sync_error_wraps_sources() {
        let err = SyncError::from(LoaderError::from(SearchIndexError::connection("refused")));
        assert!(matches!(err, SyncError::Load(LoaderError::Index(_))));
        assert!(err.to_string().contains("refused"));

        let err = SyncError::from(ContentRepositoryError::unsupported("fan-out"));
        assert!(matches!(err, SyncError::Extract(_)));
    }
}

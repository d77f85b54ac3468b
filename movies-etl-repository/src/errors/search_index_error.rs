//! Search index error types.
//!
//! This module defines the unified error type for all search index operations.

use thiserror::Error;

/// Unified errors from search index operations.
///
/// Used by the `SearchIndexProvider` trait for every backend call. Connection
/// errors are the only transient kind: the backend could not be reached or
/// asked the client to back off. Everything else means the request itself was
/// rejected and retrying it would not help.
#[derive(Debug, Clone, Error)]
pub enum SearchIndexError {
    /// Validation error (e.g., empty index name, empty document id).
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Failed to reach the search index backend, or it is temporarily unavailable.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The bulk request was rejected as a whole.
    #[error("Bulk index error: {0}")]
    BulkIndexError(String),

    /// Failed to parse response from search index backend.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Failed to serialize data for the search index backend.
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl SearchIndexError {
    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionError(msg.into())
    }

    /// Create a bulk index error.
    pub fn bulk_index(msg: impl Into<String>) -> Self {
        Self::BulkIndexError(msg.into())
    }

    /// Create a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    /// Create a serialization error.
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::SerializationError(msg.into())
    }

    /// Whether the failure is worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ConnectionError(_))
    }
}

//! # Movies ETL
//!
//! Keeps the `movies`, `genres` and `persons` search indexes in sync with the
//! content database.
//!
//! ## Architecture
//!
//! Each entity kind is synchronized in cycles:
//!
//! 1. **Extractor**: Reads rows modified since the kind's cursor
//! 2. **Transformer**: Denormalizes rows into search documents
//! 3. **Loader**: Bulk-upserts documents into the search index
//! 4. **Synchronizer**: Runs a cycle, cascading person and genre changes to
//!    their film works, and commits the cursor once everything is loaded
//! 5. **Orchestrator**: Triggers cycles on a fixed interval per kind
//!
//! ## Modules
//!
//! - [`config`]: Settings and dependency initialization
//! - [`extractor`]: Retrying reads from the content database
//! - [`transformer`]: Builds search documents from content rows
//! - [`loader`]: Writes documents into the search index
//! - [`synchronizer`]: Runs synchronization cycles
//! - [`orchestrator`]: Schedules cycles and handles shutdown
//! - [`retry`]: Backoff policy for transient failures
//! - [`errors`]: Error types for the pipeline

pub mod config;
pub mod errors;
pub mod extractor;
pub mod loader;
pub mod orchestrator;
pub mod retry;
pub mod synchronizer;
pub mod transformer;

pub use config::{Dependencies, Settings};
pub use errors::{LoaderError, SyncError};
pub use retry::RetryPolicy;
pub use synchronizer::{CycleOutcome, Synchronizer};

use movies_etl_repository::{ContentRepositoryError, SearchIndexError};
use thiserror::Error;

/// Errors that can occur during ETL initialization or execution.
#[derive(Error, Debug)]
pub enum IndexingError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The content database could not be reached.
    #[error("Database error: {0}")]
    Database(#[from] ContentRepositoryError),

    /// The search index could not be reached.
    #[error("Search index error: {0}")]
    SearchIndex(#[from] SearchIndexError),
}

impl IndexingError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}

//! Error types for the movies ETL repository.
//!
//! One error type per backend: content database, search index and cursor state.

mod content_repository_error;
mod cursor_store_error;
mod search_index_error;

pub use content_repository_error::ContentRepositoryError;
pub use cursor_store_error::CursorStoreError;
pub use search_index_error::SearchIndexError;

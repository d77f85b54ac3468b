//! Interface definitions for the ETL backends.
//!
//! These traits allow for dependency injection and swappable backends: the
//! pipeline only ever talks to them, and tests substitute in-memory mocks.

mod content_repository;
mod search_index_provider;
mod state_storage;

pub use content_repository::ContentRepository;
pub use search_index_provider::SearchIndexProvider;
pub use state_storage::StateStorage;

//! # Movies ETL Repository
//!
//! This crate provides the traits and backends the movies ETL talks to:
//!
//! - [`ContentRepository`]: read-only queries against the relational content
//!   database, with a PostgreSQL implementation
//! - [`SearchIndexProvider`]: bulk upserts into the search index, with an
//!   OpenSearch implementation
//! - [`CursorStore`]: lock-guarded, durable synchronization cursors backed by
//!   a [`StateStorage`] such as [`JsonFileStorage`]

pub mod config;
pub mod cursor;
pub mod errors;
pub mod interfaces;
pub mod opensearch;
pub mod postgres;
pub mod types;
pub mod utils;

pub use config::SearchIndexConfig;
pub use cursor::{CursorState, CursorStore, InMemoryStorage, JsonFileStorage, ScopedCursor};
pub use errors::{ContentRepositoryError, CursorStoreError, SearchIndexError};
pub use interfaces::{ContentRepository, SearchIndexProvider, StateStorage};
pub use opensearch::OpenSearchProvider;
pub use postgres::PostgresContentRepository;
pub use types::{BatchOperationResult, BatchOperationSummary, UpsertDocumentRequest};
pub use utils::validate_identifier;

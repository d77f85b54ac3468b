//! OpenSearch implementation of the search index provider.
//!
//! Indexes are expected to exist with their mappings already applied; the
//! provider only writes documents.

mod provider;

pub use provider::OpenSearchProvider;

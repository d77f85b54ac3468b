//! Core data structures used across the movies ETL.
//!
//! Records come out of the content database, documents go into the search index.

pub mod documents;
pub mod entity_kind;
pub mod records;

//! Transformer module for the movies ETL.
//!
//! Turns rows read from the content database into search documents.

mod denormalizer;

pub use denormalizer::{build_film_documents, build_genre_documents, build_person_documents};

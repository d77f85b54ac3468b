//! PostgreSQL implementation of the content repository.
//!
//! Reads the normalized `content` schema: `person`, `genre` and `film_work`
//! plus the `person_film_work` and `genre_film_work` bridge tables.

mod content_repository;
mod rows;

pub use content_repository::PostgresContentRepository;

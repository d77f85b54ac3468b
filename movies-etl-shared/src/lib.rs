//! # Movies ETL Shared
//!
//! This crate defines the data structures shared across the movies ETL:
//! entity kinds and roles, the records read from the content database, and
//! the denormalized documents written to the search index.

pub mod types;

pub use types::documents::{
    FilmDocument, FilmPersonRef, GenreDocument, GenreRef, IndexDocument, PersonDocument,
    PersonFilmRef,
};
pub use types::entity_kind::{EntityKind, ParseRoleError, Role};
pub use types::records::{
    minimum_timestamp, ChangeRecord, FilmWorkGenreRecord, FilmWorkInfo, FilmWorkPersonRecord,
    GenreInfo, PersonFilmWorkRecord, PersonInfo,
};

//! Document types for the search index.
//!
//! Every document is a complete, denormalized value. Writing a document with
//! an id that already exists replaces the previous version entirely.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::entity_kind::Role;

/// A document that can be written to the search index.
pub trait IndexDocument: Serialize + Send + Sync {
    /// Generate the document ID used in the search index.
    fn document_id(&self) -> String;
}

/// Document stored in the `genres` index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenreDocument {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
}

/// A film entry nested inside a person document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersonFilmRef {
    pub id: Uuid,
    pub title: String,
    pub imdb_rating: Option<f64>,
    pub roles: Vec<Role>,
}

/// Document stored in the `persons` index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersonDocument {
    pub id: Uuid,
    pub full_name: String,
    pub films: Vec<PersonFilmRef>,
}

/// A genre entry nested inside a film document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenreRef {
    pub id: Uuid,
    pub name: String,
}

/// A person entry nested inside a film document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FilmPersonRef {
    pub id: Uuid,
    pub name: String,
}

/// Document stored in the `movies` index.
///
/// Persons are kept twice: as `{id, name}` objects for lookups, and as flat
/// name lists for full-text search.
///
/// # Fields
///
/// - `imdb_rating`: Film rating, `None` when the source has no rating
/// - `genres`: Genres attached to the film
/// - `directors`, `actors`, `writers`: Persons partitioned by role
/// - `directors_names`, `actors_names`, `writers_names`: Names of the above
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FilmDocument {
    pub id: Uuid,
    pub imdb_rating: Option<f64>,
    pub title: String,
    pub description: Option<String>,
    pub genres: Vec<GenreRef>,
    pub directors: Vec<FilmPersonRef>,
    pub actors: Vec<FilmPersonRef>,
    pub writers: Vec<FilmPersonRef>,
    pub directors_names: Vec<String>,
    pub actors_names: Vec<String>,
    pub writers_names: Vec<String>,
}

impl FilmDocument {
    /// Create a film document with no genres and no persons.
    pub fn new(
        id: Uuid,
        title: String,
        description: Option<String>,
        imdb_rating: Option<f64>,
    ) -> Self {
        Self {
            id,
            imdb_rating,
            title,
            description,
            genres: Vec::new(),
            directors: Vec::new(),
            actors: Vec::new(),
            writers: Vec::new(),
            directors_names: Vec::new(),
            actors_names: Vec::new(),
            writers_names: Vec::new(),
        }
    }

    /// The `{id, name}` list holding persons with the given role.
    pub fn persons_with_role(&self, role: Role) -> &[FilmPersonRef] {
        match role {
            Role::Director => &self.directors,
            Role::Actor => &self.actors,
            Role::Writer => &self.writers,
        }
    }
}

impl IndexDocument for GenreDocument {
    fn document_id(&self) -> String {
        self.id.to_string()
    }
}

impl IndexDocument for PersonDocument {
    fn document_id(&self) -> String {
        self.id.to_string()
    }
}

impl IndexDocument for FilmDocument {
    fn document_id(&self) -> String {
        self.id.to_string()
    }
}

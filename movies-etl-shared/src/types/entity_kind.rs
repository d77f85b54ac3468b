//! Entity kinds synchronized by the ETL and the roles a person can hold on a film.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A kind of entity tracked by its own cursor and written to its own index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Persons,
    Genres,
    FilmWorks,
}

impl EntityKind {
    /// All kinds, in the order the trigger starts them.
    pub const ALL: [EntityKind; 3] = [EntityKind::Persons, EntityKind::Genres, EntityKind::FilmWorks];

    /// Stable name used in logs and configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Persons => "persons",
            EntityKind::Genres => "genres",
            EntityKind::FilmWorks => "film_works",
        }
    }

    /// Whether a change in this kind must be propagated to film documents.
    ///
    /// Film documents embed genre and person names, so genre and person
    /// changes fan out. Film work changes never ripple back.
    pub fn cascades_to_film_works(&self) -> bool {
        matches!(self, EntityKind::Persons | EntityKind::Genres)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role of a person on a film work, as stored in `person_film_work.role`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Actor,
    Writer,
    Director,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Actor => "actor",
            Role::Writer => "writer",
            Role::Director => "director",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a role column holds a value outside the known set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown role: {0}")]
pub struct ParseRoleError(pub String);

impl FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "actor" => Ok(Role::Actor),
            "writer" => Ok(Role::Writer),
            "director" => Ok(Role::Director),
            other => Err(ParseRoleError(other.to_string())),
        }
    }
}

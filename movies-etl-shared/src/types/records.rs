//! Records read from the content database.
//!
//! These are the validated shapes of every query result. They live for a
//! single synchronization cycle and are never persisted by the ETL.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::entity_kind::Role;

/// The smallest cursor value, used before the first successful cycle.
///
/// Year 1 is accepted by both PostgreSQL and the JSON state file, unlike
/// `DateTime::<Utc>::MIN_UTC`.
pub fn minimum_timestamp() -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(1, 1, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// A changed row: its id and modification time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub id: Uuid,
    pub modified_at: DateTime<Utc>,
}

impl ChangeRecord {
    pub fn new(id: Uuid, modified_at: DateTime<Utc>) -> Self {
        Self { id, modified_at }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenreInfo {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonInfo {
    pub id: Uuid,
    pub full_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilmWorkInfo {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub rating: Option<f64>,
    pub modified_at: DateTime<Utc>,
}

/// A genre attached to a film work through `genre_film_work`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilmWorkGenreRecord {
    pub film_work_id: Uuid,
    pub genre_id: Uuid,
    pub genre_name: String,
}

/// A single `person_film_work` row: one person in one role on one film.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilmWorkPersonRecord {
    pub film_work_id: Uuid,
    pub person_id: Uuid,
    pub person_full_name: String,
    pub role: Role,
}

/// A film a person took part in, with every role they held on it.
///
/// The repository aggregates roles per (person, film) pair, so there is one
/// record per pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonFilmWorkRecord {
    pub person_id: Uuid,
    pub film_work_id: Uuid,
    pub title: String,
    pub rating: Option<f64>,
    pub roles: Vec<Role>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn test_minimum_timestamp_is_year_one() {
        let min = minimum_timestamp();
        assert_eq!(min.year(), 1);
        assert_eq!(min.month(), 1);
        assert_eq!(min.day(), 1);
        assert!(min < Utc::now());
    }

    #[test]
    fn test_minimum_timestamp_round_trips_through_json() {
        let min = minimum_timestamp();
        let json = serde_json::to_string(&min).unwrap();
        let parsed: DateTime<Utc> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, min);
    }
}

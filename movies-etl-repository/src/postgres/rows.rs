//! Raw query result rows and their conversion into shared records.
//!
//! `sqlx::FromRow` rejects rows with missing columns or NULLs in non-optional
//! fields; the conversions below reject values the ETL cannot interpret.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::errors::ContentRepositoryError;
use movies_etl_shared::{
    ChangeRecord, FilmWorkGenreRecord, FilmWorkInfo, FilmWorkPersonRecord, GenreInfo,
    PersonFilmWorkRecord, PersonInfo, Role,
};

#[derive(sqlx::FromRow)]
pub(crate) struct ChangeRow {
    id: Uuid,
    modified_at: DateTime<Utc>,
}

impl From<ChangeRow> for ChangeRecord {
    fn from(row: ChangeRow) -> Self {
        ChangeRecord::new(row.id, row.modified_at)
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct GenreRow {
    id: Uuid,
    name: String,
    description: Option<String>,
}

impl From<GenreRow> for GenreInfo {
    fn from(row: GenreRow) -> Self {
        GenreInfo {
            id: row.id,
            name: row.name,
            description: row.description,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct PersonRow {
    id: Uuid,
    full_name: String,
}

impl From<PersonRow> for PersonInfo {
    fn from(row: PersonRow) -> Self {
        PersonInfo {
            id: row.id,
            full_name: row.full_name,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct FilmWorkRow {
    id: Uuid,
    title: String,
    description: Option<String>,
    rating: Option<f64>,
    modified_at: DateTime<Utc>,
}

impl From<FilmWorkRow> for FilmWorkInfo {
    fn from(row: FilmWorkRow) -> Self {
        FilmWorkInfo {
            id: row.id,
            title: row.title,
            description: row.description,
            rating: row.rating,
            modified_at: row.modified_at,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct FilmWorkGenreRow {
    film_work_id: Uuid,
    genre_id: Uuid,
    genre_name: String,
}

impl From<FilmWorkGenreRow> for FilmWorkGenreRecord {
    fn from(row: FilmWorkGenreRow) -> Self {
        FilmWorkGenreRecord {
            film_work_id: row.film_work_id,
            genre_id: row.genre_id,
            genre_name: row.genre_name,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct FilmWorkPersonRow {
    pub(crate) film_work_id: Uuid,
    pub(crate) person_id: Uuid,
    pub(crate) person_full_name: String,
    pub(crate) role: String,
}

impl TryFrom<FilmWorkPersonRow> for FilmWorkPersonRecord {
    type Error = ContentRepositoryError;

    fn try_from(row: FilmWorkPersonRow) -> Result<Self, Self::Error> {
        let role = parse_role(&row.role, row.person_id, row.film_work_id)?;
        Ok(FilmWorkPersonRecord {
            film_work_id: row.film_work_id,
            person_id: row.person_id,
            person_full_name: row.person_full_name,
            role,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct PersonFilmWorkRow {
    pub(crate) person_id: Uuid,
    pub(crate) film_work_id: Uuid,
    pub(crate) title: String,
    pub(crate) rating: Option<f64>,
    pub(crate) roles: Vec<String>,
}

impl TryFrom<PersonFilmWorkRow> for PersonFilmWorkRecord {
    type Error = ContentRepositoryError;

    fn try_from(row: PersonFilmWorkRow) -> Result<Self, Self::Error> {
        let mut roles = Vec::with_capacity(row.roles.len());
        for raw in &row.roles {
            let role = parse_role(raw, row.person_id, row.film_work_id)?;
            if !roles.contains(&role) {
                roles.push(role);
            }
        }

        Ok(PersonFilmWorkRecord {
            person_id: row.person_id,
            film_work_id: row.film_work_id,
            title: row.title,
            rating: row.rating,
            roles,
        })
    }
}

fn parse_role(
    raw: &str,
    person_id: Uuid,
    film_work_id: Uuid,
) -> Result<Role, ContentRepositoryError> {
    raw.parse::<Role>().map_err(|e| {
        ContentRepositoryError::invalid_row(format!(
            "{} (person_id={}, film_work_id={})",
            e, person_id, film_work_id
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_person_row_with_known_role() {
        let row = FilmWorkPersonRow {
            film_work_id: Uuid::new_v4(),
            person_id: Uuid::new_v4(),
            person_full_name: "Mark Hamill".to_string(),
            role: "actor".to_string(),
        };

        let record = FilmWorkPersonRecord::try_from(row).unwrap();
        assert_eq!(record.role, Role::Actor);
        assert_eq!(record.person_full_name, "Mark Hamill");
    }

    #[test]
    fn test_person_row_with_unknown_role_is_invalid() {
        let row = FilmWorkPersonRow {
            film_work_id: Uuid::new_v4(),
            person_id: Uuid::new_v4(),
            person_full_name: "Gary Kurtz".to_string(),
            role: "producer".to_string(),
        };

        let err = FilmWorkPersonRecord::try_from(row).unwrap_err();
        assert!(matches!(err, ContentRepositoryError::InvalidRow(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_aggregated_roles_are_deduplicated() {
        let row = PersonFilmWorkRow {
            person_id: Uuid::new_v4(),
            film_work_id: Uuid::new_v4(),
            title: "Star Wars".to_string(),
            rating: Some(8.6),
            roles: vec![
                "director".to_string(),
                "writer".to_string(),
                "director".to_string(),
            ],
        };

        let record = PersonFilmWorkRecord::try_from(row).unwrap();
        assert_eq!(record.roles, vec![Role::Director, Role::Writer]);
    }
}

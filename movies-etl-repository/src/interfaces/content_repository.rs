//! Content repository trait definition.
//!
//! The content repository is the read-only view of the relational database
//! the ETL synchronizes from.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::errors::ContentRepositoryError;
use movies_etl_shared::{
    ChangeRecord, EntityKind, FilmWorkGenreRecord, FilmWorkInfo, FilmWorkPersonRecord, GenreInfo,
    PersonFilmWorkRecord, PersonInfo,
};

/// Read-only queries against the content database.
///
/// Every method is a single query; retries are the caller's business.
/// Methods taking id slices return an empty result for an empty slice.
#[async_trait]
pub trait ContentRepository: Send + Sync {
    /// Rows of `kind` modified strictly after `since`, ordered by
    /// modification time, at most `limit` of them.
    async fn fetch_changed(
        &self,
        kind: EntityKind,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ChangeRecord>, ContentRepositoryError>;

    /// One page of the distinct film works linked to any of `ids`.
    ///
    /// `kind` selects the bridge table (`person_film_work` for persons,
    /// `genre_film_work` for genres). Pages are ordered by
    /// `(modified_at, id)`; `after` is the last record of the previous page,
    /// or `None` for the first page.
    ///
    /// # Returns
    ///
    /// * `Err(ContentRepositoryError::Unsupported)` - For `EntityKind::FilmWorks`,
    ///   which has no dependent film works
    async fn fetch_dependent_film_works(
        &self,
        kind: EntityKind,
        ids: &[Uuid],
        after: Option<ChangeRecord>,
        limit: usize,
    ) -> Result<Vec<ChangeRecord>, ContentRepositoryError>;

    async fn fetch_genres_info(&self, ids: &[Uuid])
        -> Result<Vec<GenreInfo>, ContentRepositoryError>;

    async fn fetch_persons_info(
        &self,
        ids: &[Uuid],
    ) -> Result<Vec<PersonInfo>, ContentRepositoryError>;

    async fn fetch_film_works_info(
        &self,
        ids: &[Uuid],
    ) -> Result<Vec<FilmWorkInfo>, ContentRepositoryError>;

    /// Genres attached to the given film works.
    async fn fetch_film_work_genres(
        &self,
        film_work_ids: &[Uuid],
    ) -> Result<Vec<FilmWorkGenreRecord>, ContentRepositoryError>;

    /// Every (film work, person, role) row for the given film works.
    async fn fetch_film_work_persons(
        &self,
        film_work_ids: &[Uuid],
    ) -> Result<Vec<FilmWorkPersonRecord>, ContentRepositoryError>;

    /// Films of the given persons, one record per (person, film) pair with
    /// the roles aggregated.
    async fn fetch_person_film_works(
        &self,
        person_ids: &[Uuid],
    ) -> Result<Vec<PersonFilmWorkRecord>, ContentRepositoryError>;
}

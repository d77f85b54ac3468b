//! Extractor module for the movies ETL.
//!
//! Reads changed rows and everything needed to denormalize them from the
//! content database. Every query is retried on transient failures.

use async_stream::try_stream;
use chrono::{DateTime, Utc};
use futures::Stream;
use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::retry::RetryPolicy;
use movies_etl_repository::{ContentRepository, ContentRepositoryError};
use movies_etl_shared::{
    ChangeRecord, EntityKind, FilmWorkGenreRecord, FilmWorkInfo, FilmWorkPersonRecord, GenreInfo,
    PersonFilmWorkRecord, PersonInfo,
};

/// Default number of film works per cascade chunk.
pub const DEFAULT_FAN_OUT_BATCH_SIZE: usize = 1000;

/// Retrying, read-only view of the content database.
pub struct ContentExtractor {
    repository: Arc<dyn ContentRepository>,
    retry: RetryPolicy,
    fan_out_batch_size: usize,
}

impl ContentExtractor {
    /// Create a new extractor over the given repository.
    pub fn new(repository: Arc<dyn ContentRepository>, retry: RetryPolicy) -> Self {
        Self {
            repository,
            retry,
            fan_out_batch_size: DEFAULT_FAN_OUT_BATCH_SIZE,
        }
    }

    /// Set the number of film works yielded per cascade chunk.
    pub fn with_fan_out_batch_size(mut self, fan_out_batch_size: usize) -> Self {
        self.fan_out_batch_size = fan_out_batch_size.max(1);
        self
    }

    /// Rows of `kind` modified after `since`, oldest first, at most `limit`.
    #[instrument(skip(self))]
    pub async fn fetch_changed(
        &self,
        kind: EntityKind,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ChangeRecord>, ContentRepositoryError> {
        self.retry
            .run("fetch_changed", || {
                self.repository.fetch_changed(kind, since, limit)
            })
            .await
    }

    /// Film works linked to any of `ids`, in chunks of at most
    /// `fan_out_batch_size`, ordered by `(modified_at, id)`.
    ///
    /// Each chunk is a separate query that resumes after the last record of
    /// the previous chunk, so memory stays bounded however many film works
    /// are linked. Yields `Unsupported` for `EntityKind::FilmWorks`.
    pub fn dependent_film_works<'a>(
        &'a self,
        kind: EntityKind,
        ids: &'a [Uuid],
    ) -> impl Stream<Item = Result<Vec<ChangeRecord>, ContentRepositoryError>> + Send + 'a {
        try_stream! {
            if !kind.cascades_to_film_works() {
                Err::<(), _>(ContentRepositoryError::unsupported(format!(
                    "{} changes do not cascade to film works",
                    kind
                )))?;
            }

            let batch_size = self.fan_out_batch_size;
            let mut after: Option<ChangeRecord> = None;
            let mut exhausted = ids.is_empty();

            while !exhausted {
                let chunk = self
                    .retry
                    .run("fetch_dependent_film_works", || {
                        self.repository
                            .fetch_dependent_film_works(kind, ids, after, batch_size)
                    })
                    .await?;

                debug!(kind = %kind, count = chunk.len(), "Fetched dependent film works");

                exhausted = chunk.len() < batch_size;
                after = chunk.last().copied();

                if !chunk.is_empty() {
                    yield chunk;
                }
            }
        }
    }

    pub async fn fetch_genres_info(
        &self,
        ids: &[Uuid],
    ) -> Result<Vec<GenreInfo>, ContentRepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.retry
            .run("fetch_genres_info", || self.repository.fetch_genres_info(ids))
            .await
    }

    pub async fn fetch_persons_info(
        &self,
        ids: &[Uuid],
    ) -> Result<Vec<PersonInfo>, ContentRepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.retry
            .run("fetch_persons_info", || self.repository.fetch_persons_info(ids))
            .await
    }

    pub async fn fetch_film_works_info(
        &self,
        ids: &[Uuid],
    ) -> Result<Vec<FilmWorkInfo>, ContentRepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.retry
            .run("fetch_film_works_info", || {
                self.repository.fetch_film_works_info(ids)
            })
            .await
    }

    pub async fn fetch_film_work_genres(
        &self,
        film_work_ids: &[Uuid],
    ) -> Result<Vec<FilmWorkGenreRecord>, ContentRepositoryError> {
        if film_work_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.retry
            .run("fetch_film_work_genres", || {
                self.repository.fetch_film_work_genres(film_work_ids)
            })
            .await
    }

    pub async fn fetch_film_work_persons(
        &self,
        film_work_ids: &[Uuid],
    ) -> Result<Vec<FilmWorkPersonRecord>, ContentRepositoryError> {
        if film_work_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.retry
            .run("fetch_film_work_persons", || {
                self.repository.fetch_film_work_persons(film_work_ids)
            })
            .await
    }

    /// Films of each person, one record per (person, film) with its roles.
    pub async fn fetch_person_film_works(
        &self,
        person_ids: &[Uuid],
    ) -> Result<Vec<PersonFilmWorkRecord>, ContentRepositoryError> {
        if person_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.retry
            .run("fetch_person_film_works", || {
                self.repository.fetch_person_film_works(person_ids)
            })
            .await
    }
}

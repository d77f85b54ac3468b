//! PostgreSQL-backed content repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use tracing::{debug, info};
use uuid::Uuid;

use crate::errors::ContentRepositoryError;
use crate::interfaces::ContentRepository;
use crate::postgres::rows::{
    ChangeRow, FilmWorkGenreRow, FilmWorkPersonRow, FilmWorkRow, GenreRow, PersonFilmWorkRow,
    PersonRow,
};
use crate::utils;
use movies_etl_shared::{
    ChangeRecord, EntityKind, FilmWorkGenreRecord, FilmWorkInfo, FilmWorkPersonRecord, GenreInfo,
    PersonFilmWorkRecord, PersonInfo,
};

/// SQL text for every query, rendered once for the configured schema.
#[derive(Debug, Clone)]
struct Queries {
    changed_persons: String,
    changed_genres: String,
    changed_film_works: String,
    film_works_by_persons: String,
    film_works_by_genres: String,
    genres_info: String,
    persons_info: String,
    film_works_info: String,
    film_work_genres: String,
    film_work_persons: String,
    person_film_works: String,
}

impl Queries {
    fn new(schema: &str) -> Self {
        let changed = |table: &str| {
            format!(
                "SELECT id, modified_at FROM {schema}.{table} \
                 WHERE modified_at > $1 \
                 ORDER BY modified_at \
                 LIMIT $2"
            )
        };

        // Keyset pagination: $2/$3 are the (modified_at, id) of the last row
        // of the previous page, both NULL for the first page.
        let dependent = |bridge: &str, column: &str| {
            format!(
                "SELECT fw.id, fw.modified_at FROM {schema}.film_work fw \
                 WHERE EXISTS ( \
                     SELECT 1 FROM {schema}.{bridge} b \
                     WHERE b.film_work_id = fw.id AND b.{column} = ANY($1) \
                 ) \
                 AND ($2::timestamptz IS NULL OR (fw.modified_at, fw.id) > ($2::timestamptz, $3::uuid)) \
                 ORDER BY fw.modified_at, fw.id \
                 LIMIT $4"
            )
        };

        Self {
            changed_persons: changed("person"),
            changed_genres: changed("genre"),
            changed_film_works: changed("film_work"),
            film_works_by_persons: dependent("person_film_work", "person_id"),
            film_works_by_genres: dependent("genre_film_work", "genre_id"),
            genres_info: format!(
                "SELECT id, name, description FROM {schema}.genre WHERE id = ANY($1)"
            ),
            persons_info: format!(
                "SELECT id, full_name FROM {schema}.person WHERE id = ANY($1)"
            ),
            film_works_info: format!(
                "SELECT id, title, description, rating::float8 AS rating, modified_at \
                 FROM {schema}.film_work WHERE id = ANY($1)"
            ),
            film_work_genres: format!(
                "SELECT gfw.film_work_id, gfw.genre_id, g.name AS genre_name \
                 FROM {schema}.genre_film_work gfw \
                 INNER JOIN {schema}.genre g ON g.id = gfw.genre_id \
                 WHERE gfw.film_work_id = ANY($1) \
                 ORDER BY gfw.film_work_id, g.name, g.id"
            ),
            film_work_persons: format!(
                "SELECT pfw.film_work_id, pfw.person_id, p.full_name AS person_full_name, \
                        pfw.role::text AS role \
                 FROM {schema}.person_film_work pfw \
                 INNER JOIN {schema}.person p ON p.id = pfw.person_id \
                 WHERE pfw.film_work_id = ANY($1) \
                 ORDER BY pfw.film_work_id, p.full_name, p.id"
            ),
            person_film_works: format!(
                "SELECT pfw.person_id, pfw.film_work_id, fw.title, fw.rating::float8 AS rating, \
                        array_agg(DISTINCT pfw.role::text) AS roles \
                 FROM {schema}.person_film_work pfw \
                 INNER JOIN {schema}.film_work fw ON fw.id = pfw.film_work_id \
                 WHERE pfw.person_id = ANY($1) \
                 GROUP BY pfw.person_id, pfw.film_work_id, fw.title, fw.rating \
                 ORDER BY pfw.person_id, fw.title, pfw.film_work_id"
            ),
        }
    }

    fn changed(&self, kind: EntityKind) -> &str {
        match kind {
            EntityKind::Persons => &self.changed_persons,
            EntityKind::Genres => &self.changed_genres,
            EntityKind::FilmWorks => &self.changed_film_works,
        }
    }
}

/// PostgreSQL implementation of [`ContentRepository`].
///
/// All queries are plain reads; the repository never writes to the content
/// database.
pub struct PostgresContentRepository {
    pool: sqlx::PgPool,
    queries: Queries,
}

impl PostgresContentRepository {
    /// Creates a repository over an existing pool.
    ///
    /// # Arguments
    ///
    /// * `pool` - Connection pool for the content database
    /// * `schema` - Schema holding the content tables (e.g. `content`)
    ///
    /// # Returns
    ///
    /// * `Ok(PostgresContentRepository)` - Ready-to-use repository instance
    /// * `Err(ContentRepositoryError::InvalidSchema)` - If `schema` is not a plain identifier
    pub fn new(pool: sqlx::PgPool, schema: &str) -> Result<Self, ContentRepositoryError> {
        utils::validate_identifier(schema).map_err(ContentRepositoryError::InvalidSchema)?;

        Ok(Self {
            pool,
            queries: Queries::new(schema),
        })
    }

    /// Connects to the content database and creates a repository.
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        schema: &str,
    ) -> Result<Self, ContentRepositoryError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        info!(schema = %schema, max_connections, "Connected to content database");
        Self::new(pool, schema)
    }
}

fn limit_param(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

#[async_trait]
impl ContentRepository for PostgresContentRepository {
    async fn fetch_changed(
        &self,
        kind: EntityKind,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ChangeRecord>, ContentRepositoryError> {
        let rows = sqlx::query_as::<_, ChangeRow>(self.queries.changed(kind))
            .bind(since)
            .bind(limit_param(limit))
            .fetch_all(&self.pool)
            .await?;

        debug!(kind = %kind, since = %since, count = rows.len(), "Fetched changed rows");
        Ok(rows.into_iter().map(ChangeRecord::from).collect())
    }

    async fn fetch_dependent_film_works(
        &self,
        kind: EntityKind,
        ids: &[Uuid],
        after: Option<ChangeRecord>,
        limit: usize,
    ) -> Result<Vec<ChangeRecord>, ContentRepositoryError> {
        let query = match kind {
            EntityKind::Persons => &self.queries.film_works_by_persons,
            EntityKind::Genres => &self.queries.film_works_by_genres,
            EntityKind::FilmWorks => {
                return Err(ContentRepositoryError::unsupported(
                    "film works have no dependent film works",
                ))
            }
        };

        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, ChangeRow>(query)
            .bind(ids)
            .bind(after.map(|record| record.modified_at))
            .bind(after.map(|record| record.id))
            .bind(limit_param(limit))
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(ChangeRecord::from).collect())
    }

    async fn fetch_genres_info(
        &self,
        ids: &[Uuid],
    ) -> Result<Vec<GenreInfo>, ContentRepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, GenreRow>(&self.queries.genres_info)
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(GenreInfo::from).collect())
    }

    async fn fetch_persons_info(
        &self,
        ids: &[Uuid],
    ) -> Result<Vec<PersonInfo>, ContentRepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, PersonRow>(&self.queries.persons_info)
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(PersonInfo::from).collect())
    }

    async fn fetch_film_works_info(
        &self,
        ids: &[Uuid],
    ) -> Result<Vec<FilmWorkInfo>, ContentRepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, FilmWorkRow>(&self.queries.film_works_info)
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(FilmWorkInfo::from).collect())
    }

    async fn fetch_film_work_genres(
        &self,
        film_work_ids: &[Uuid],
    ) -> Result<Vec<FilmWorkGenreRecord>, ContentRepositoryError> {
        if film_work_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, FilmWorkGenreRow>(&self.queries.film_work_genres)
            .bind(film_work_ids)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(FilmWorkGenreRecord::from).collect())
    }

    async fn fetch_film_work_persons(
        &self,
        film_work_ids: &[Uuid],
    ) -> Result<Vec<FilmWorkPersonRecord>, ContentRepositoryError> {
        if film_work_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, FilmWorkPersonRow>(&self.queries.film_work_persons)
            .bind(film_work_ids)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(FilmWorkPersonRecord::try_from)
            .collect()
    }

    async fn fetch_person_film_works(
        &self,
        person_ids: &[Uuid],
    ) -> Result<Vec<PersonFilmWorkRecord>, ContentRepositoryError> {
        if person_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, PersonFilmWorkRow>(&self.queries.person_film_works)
            .bind(person_ids)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(PersonFilmWorkRecord::try_from)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queries_use_schema() {
        let queries = Queries::new("content");

        assert!(queries.changed_persons.contains("FROM content.person"));
        assert!(queries.changed_genres.contains("FROM content.genre"));
        assert!(queries.changed_film_works.contains("FROM content.film_work"));
        assert!(queries.film_work_persons.contains("content.person_film_work"));
    }

    #[test]
    fn test_change_detection_is_strict_and_ordered() {
        let queries = Queries::new("content");

        for kind in EntityKind::ALL {
            let sql = queries.changed(kind);
            assert!(sql.contains("modified_at > $1"));
            assert!(sql.contains("ORDER BY modified_at"));
            assert!(sql.contains("LIMIT $2"));
        }
    }

    #[test]
    fn test_dependent_queries_use_matching_bridge_table() {
        let queries = Queries::new("content");

        assert!(queries
            .film_works_by_persons
            .contains("content.person_film_work b"));
        assert!(queries.film_works_by_persons.contains("b.person_id = ANY($1)"));
        assert!(queries
            .film_works_by_genres
            .contains("content.genre_film_work b"));
        assert!(queries.film_works_by_genres.contains("b.genre_id = ANY($1)"));
        assert!(queries
            .film_works_by_genres
            .contains("ORDER BY fw.modified_at, fw.id"));
    }

    #[test]
    fn test_person_film_works_aggregate_roles() {
        let queries = Queries::new("content");

        assert!(queries.person_film_works.contains("array_agg(DISTINCT"));
        assert!(queries.person_film_works.contains("GROUP BY"));
    }

    #[test]
    fn test_limit_param_saturates() {
        assert_eq!(limit_param(100), 100);
        assert_eq!(limit_param(usize::MAX), i64::MAX);
    }
}

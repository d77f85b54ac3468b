//! Synchronizer module for the movies ETL.
//!
//! Runs one synchronization cycle for an entity kind: extract changed rows,
//! cascade to dependent film works, denormalize, load, and only then commit
//! the cursor.

use chrono::{DateTime, Utc};
use futures::{pin_mut, TryStreamExt};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use crate::errors::SyncError;
use crate::extractor::{ContentExtractor, DEFAULT_FAN_OUT_BATCH_SIZE};
use crate::loader::SearchLoader;
use crate::transformer::{build_film_documents, build_genre_documents, build_person_documents};
use movies_etl_repository::CursorStore;
use movies_etl_shared::{ChangeRecord, EntityKind};

/// Configuration for the synchronizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynchronizerConfig {
    /// Changed persons handled per cycle.
    pub persons_per_run: usize,
    /// Changed genres handled per cycle.
    pub genres_per_run: usize,
    /// Changed film works handled per cycle.
    pub film_works_per_run: usize,
    /// Film works per cascade chunk.
    pub fan_out_batch_size: usize,
}

impl Default for SynchronizerConfig {
    fn default() -> Self {
        Self {
            persons_per_run: 100,
            genres_per_run: 1,
            film_works_per_run: 1000,
            fan_out_batch_size: DEFAULT_FAN_OUT_BATCH_SIZE,
        }
    }
}

impl SynchronizerConfig {
    /// Maximum number of changed rows of `kind` handled in one cycle.
    pub fn per_run(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::Persons => self.persons_per_run,
            EntityKind::Genres => self.genres_per_run,
            EntityKind::FilmWorks => self.film_works_per_run,
        }
    }
}

/// Stage of a synchronization cycle, reported when a cycle fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStage {
    Extracting,
    CascadingFanOut,
    Transforming,
    Loading,
    CommittingCursor,
}

impl fmt::Display for SyncStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            SyncStage::Extracting => "extracting",
            SyncStage::CascadingFanOut => "cascading_fan_out",
            SyncStage::Transforming => "transforming",
            SyncStage::Loading => "loading",
            SyncStage::CommittingCursor => "committing_cursor",
        };
        f.write_str(stage)
    }
}

/// A failure tagged with the stage it happened in.
type StageError = (SyncStage, SyncError);

fn at<E: Into<SyncError>>(stage: SyncStage) -> impl FnOnce(E) -> StageError {
    move |e| (stage, e.into())
}

/// Result of a synchronization cycle that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Another cycle for the same kind held the cursor.
    Skipped,
    /// Nothing changed since the cursor; nothing was written.
    NoChanges,
    /// Changes were loaded and the cursor committed.
    Synchronized {
        /// Changed rows of the cycle's kind.
        changed: usize,
        /// Dependent film works reloaded by the cascade.
        cascaded: usize,
        /// Documents written across all indexes.
        documents: usize,
        /// The cursor value now stored.
        cursor: DateTime<Utc>,
    },
}

/// Counters accumulated over the lifetime of the process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub cycles_succeeded: u64,
    pub cycles_failed: u64,
    pub documents_loaded: u64,
}

/// Runs synchronization cycles against a shared cursor store.
pub struct Synchronizer {
    extractor: ContentExtractor,
    loader: SearchLoader,
    cursors: Arc<CursorStore>,
    config: SynchronizerConfig,
    cycles_succeeded: AtomicU64,
    cycles_failed: AtomicU64,
    documents_loaded: AtomicU64,
}

impl Synchronizer {
    /// Create a new synchronizer.
    pub fn new(
        extractor: ContentExtractor,
        loader: SearchLoader,
        cursors: Arc<CursorStore>,
        config: SynchronizerConfig,
    ) -> Self {
        Self {
            extractor,
            loader,
            cursors,
            config,
            cycles_succeeded: AtomicU64::new(0),
            cycles_failed: AtomicU64::new(0),
            documents_loaded: AtomicU64::new(0),
        }
    }

    /// Run one cycle for `kind`.
    ///
    /// On error the cursor keeps its previous value, so the next cycle
    /// replays the same changes.
    #[instrument(skip(self))]
    pub async fn synchronize(&self, kind: EntityKind) -> Result<CycleOutcome, SyncError> {
        let Some(cursor) = self.cursors.acquire(kind).await else {
            info!(kind = %kind, "Cycle already running, skipping");
            return Ok(CycleOutcome::Skipped);
        };

        let since = cursor.since();
        let mut documents = 0;
        let result = self.run_cycle(kind, since, &mut documents).await;

        match result {
            Ok(None) => {
                debug!(kind = %kind, since = %since, "No changes");
                Ok(CycleOutcome::NoChanges)
            }
            Ok(Some((changed, cascaded, new_cursor))) => {
                let committed = match self.cursors.commit(cursor, new_cursor).await {
                    Ok(committed) => committed,
                    Err(e) => {
                        return Err(self.fail(
                            kind,
                            SyncStage::CommittingCursor,
                            documents,
                            e.into(),
                        ))
                    }
                };

                self.cycles_succeeded.fetch_add(1, Ordering::Relaxed);
                self.documents_loaded
                    .fetch_add(documents as u64, Ordering::Relaxed);

                info!(
                    kind = %kind,
                    changed,
                    cascaded,
                    documents,
                    cursor = %committed,
                    "Cycle completed"
                );

                Ok(CycleOutcome::Synchronized {
                    changed,
                    cascaded,
                    documents,
                    cursor: committed,
                })
            }
            Err((stage, e)) => {
                drop(cursor);
                Err(self.fail(kind, stage, documents, e))
            }
        }
    }

    /// A copy of the lifetime counters.
    pub fn stats(&self) -> SyncStats {
        SyncStats {
            cycles_succeeded: self.cycles_succeeded.load(Ordering::Relaxed),
            cycles_failed: self.cycles_failed.load(Ordering::Relaxed),
            documents_loaded: self.documents_loaded.load(Ordering::Relaxed),
        }
    }

    fn fail(&self, kind: EntityKind, stage: SyncStage, documents: usize, e: SyncError) -> SyncError {
        self.cycles_failed.fetch_add(1, Ordering::Relaxed);
        // Documents already written stay in the index; the replay rewrites them.
        self.documents_loaded
            .fetch_add(documents as u64, Ordering::Relaxed);
        error!(kind = %kind, stage = %stage, error = %e, "Cycle failed, cursor unchanged");
        e
    }

    /// Everything between acquiring and committing the cursor.
    ///
    /// # Returns
    ///
    /// `None` when nothing changed, otherwise the number of changed and
    /// cascaded rows and the new cursor value.
    async fn run_cycle(
        &self,
        kind: EntityKind,
        since: DateTime<Utc>,
        documents: &mut usize,
    ) -> Result<Option<(usize, usize, DateTime<Utc>)>, StageError> {
        let changed = self
            .extractor
            .fetch_changed(kind, since, self.config.per_run(kind))
            .await
            .map_err(at(SyncStage::Extracting))?;

        let Some(new_cursor) = changed.iter().map(|r| r.modified_at).max() else {
            return Ok(None);
        };

        let ids: Vec<Uuid> = changed.iter().map(|r| r.id).collect();
        *documents += self.load_kind(kind, &ids).await?;

        let mut cascaded = 0;
        if kind.cascades_to_film_works() {
            let (film_works, loaded) = self.cascade(kind, &ids).await?;
            cascaded = film_works;
            *documents += loaded;
        }

        Ok(Some((changed.len(), cascaded, new_cursor)))
    }

    /// Denormalize and load the changed rows of the cycle's own kind.
    async fn load_kind(&self, kind: EntityKind, ids: &[Uuid]) -> Result<usize, StageError> {
        match kind {
            EntityKind::Genres => {
                let infos = self
                    .extractor
                    .fetch_genres_info(ids)
                    .await
                    .map_err(at(SyncStage::Extracting))?;
                let documents = build_genre_documents(&infos);
                self.loader
                    .upsert(kind, &documents)
                    .await
                    .map_err(at(SyncStage::Loading))
            }
            EntityKind::Persons => {
                let infos = self
                    .extractor
                    .fetch_persons_info(ids)
                    .await
                    .map_err(at(SyncStage::Extracting))?;
                let films = self
                    .extractor
                    .fetch_person_film_works(ids)
                    .await
                    .map_err(at(SyncStage::Extracting))?;
                let documents = build_person_documents(&infos, &films);
                self.loader
                    .upsert(kind, &documents)
                    .await
                    .map_err(at(SyncStage::Loading))
            }
            EntityKind::FilmWorks => self.load_film_works(ids, SyncStage::Extracting).await,
        }
    }

    /// Reload every film work linked to the changed persons or genres, one
    /// chunk at a time.
    ///
    /// # Returns
    ///
    /// The number of film works reloaded and of documents written.
    async fn cascade(
        &self,
        kind: EntityKind,
        ids: &[Uuid],
    ) -> Result<(usize, usize), StageError> {
        let chunks = self.extractor.dependent_film_works(kind, ids);
        pin_mut!(chunks);

        let mut cascaded = 0;
        let mut loaded = 0;
        while let Some(chunk) = chunks
            .try_next()
            .await
            .map_err(at(SyncStage::CascadingFanOut))?
        {
            let film_work_ids: Vec<Uuid> = chunk.iter().map(|r: &ChangeRecord| r.id).collect();
            loaded += self
                .load_film_works(&film_work_ids, SyncStage::CascadingFanOut)
                .await?;
            cascaded += chunk.len();
        }

        debug!(kind = %kind, cascaded, "Cascade completed");
        Ok((cascaded, loaded))
    }

    /// The film work sub-pipeline: info and relations, denormalize, load.
    async fn load_film_works(
        &self,
        ids: &[Uuid],
        stage: SyncStage,
    ) -> Result<usize, StageError> {
        let infos = self
            .extractor
            .fetch_film_works_info(ids)
            .await
            .map_err(at(stage))?;
        let genres = self
            .extractor
            .fetch_film_work_genres(ids)
            .await
            .map_err(at(stage))?;
        let persons = self
            .extractor
            .fetch_film_work_persons(ids)
            .await
            .map_err(at(stage))?;

        let documents = build_film_documents(&infos, &genres, &persons);
        debug!(stage = %SyncStage::Transforming, count = documents.len(), "Built film documents");

        self.loader
            .upsert(EntityKind::FilmWorks, &documents)
            .await
            .map_err(at(SyncStage::Loading))
    }
}

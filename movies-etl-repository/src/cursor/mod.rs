//! Synchronization cursors.
//!
//! A cursor is the modification time of the newest row that has been fully
//! synchronized for one entity kind. The store hands out one cursor per kind
//! at a time and persists a new value only when the caller commits it.

mod file_storage;
mod memory_storage;

pub use file_storage::JsonFileStorage;
pub use memory_storage::InMemoryStorage;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use crate::errors::CursorStoreError;
use crate::interfaces::StateStorage;
use movies_etl_shared::{minimum_timestamp, EntityKind};

/// The persisted record: one watermark per entity kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorState {
    #[serde(default = "minimum_timestamp")]
    pub persons_modified_cursor: DateTime<Utc>,
    #[serde(default = "minimum_timestamp")]
    pub genres_modified_cursor: DateTime<Utc>,
    #[serde(default = "minimum_timestamp")]
    pub film_works_modified_cursor: DateTime<Utc>,
}

impl Default for CursorState {
    fn default() -> Self {
        Self {
            persons_modified_cursor: minimum_timestamp(),
            genres_modified_cursor: minimum_timestamp(),
            film_works_modified_cursor: minimum_timestamp(),
        }
    }
}

impl CursorState {
    pub fn get(&self, kind: EntityKind) -> DateTime<Utc> {
        match kind {
            EntityKind::Persons => self.persons_modified_cursor,
            EntityKind::Genres => self.genres_modified_cursor,
            EntityKind::FilmWorks => self.film_works_modified_cursor,
        }
    }

    pub fn set(&mut self, kind: EntityKind, value: DateTime<Utc>) {
        match kind {
            EntityKind::Persons => self.persons_modified_cursor = value,
            EntityKind::Genres => self.genres_modified_cursor = value,
            EntityKind::FilmWorks => self.film_works_modified_cursor = value,
        }
    }
}

/// Exclusive access to one kind's cursor.
///
/// Holding a `ScopedCursor` guarantees that no other cycle for the same kind
/// is running. Dropping it without committing releases the lock and leaves
/// the stored value untouched.
pub struct ScopedCursor {
    kind: EntityKind,
    since: DateTime<Utc>,
    _guard: OwnedMutexGuard<()>,
}

impl ScopedCursor {
    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// The current watermark: rows modified after it still need syncing.
    pub fn since(&self) -> DateTime<Utc> {
        self.since
    }
}

impl fmt::Debug for ScopedCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedCursor")
            .field("kind", &self.kind)
            .field("since", &self.since)
            .finish()
    }
}

/// Lock-guarded cursor storage shared by all synchronization cycles.
pub struct CursorStore {
    storage: Arc<dyn StateStorage>,
    /// Last committed state. Also serializes commits so concurrent kinds never
    /// overwrite each other's value in the shared record.
    state: Mutex<CursorState>,
    locks: HashMap<EntityKind, Arc<Mutex<()>>>,
}

impl CursorStore {
    /// Open the store, reading the persisted state.
    ///
    /// A missing, unreadable or corrupt state falls back to the default state
    /// (every cursor at the minimum timestamp) instead of failing.
    pub async fn open(storage: Arc<dyn StateStorage>) -> Self {
        let state = match storage.load().await {
            Ok(Some(state)) => {
                info!(
                    persons = %state.persons_modified_cursor,
                    genres = %state.genres_modified_cursor,
                    film_works = %state.film_works_modified_cursor,
                    "Loaded cursor state"
                );
                state
            }
            Ok(None) => {
                info!("No cursor state found, starting from the beginning");
                CursorState::default()
            }
            Err(e) => {
                warn!(error = %e, "Failed to read cursor state, starting from the beginning");
                CursorState::default()
            }
        };

        let locks = EntityKind::ALL
            .iter()
            .map(|kind| (*kind, Arc::new(Mutex::new(()))))
            .collect();

        Self {
            storage,
            state: Mutex::new(state),
            locks,
        }
    }

    /// Take exclusive ownership of the cursor for `kind`.
    ///
    /// Returns `None` if a cycle for the same kind currently holds it.
    pub async fn acquire(&self, kind: EntityKind) -> Option<ScopedCursor> {
        let lock = self.locks.get(&kind)?.clone();
        let guard = match lock.try_lock_owned() {
            Ok(guard) => guard,
            Err(_) => {
                debug!(kind = %kind, "Cursor is held by another cycle");
                return None;
            }
        };

        let since = self.state.lock().await.get(kind);

        Some(ScopedCursor {
            kind,
            since,
            _guard: guard,
        })
    }

    /// Persist a new value for the cursor and release it.
    ///
    /// The stored value is `max(since, new_value)`. On a storage error nothing
    /// changes and the lock is still released.
    ///
    /// # Returns
    ///
    /// * `Ok(DateTime<Utc>)` - The value now stored for the cursor's kind
    /// * `Err(CursorStoreError)` - If the state could not be persisted
    pub async fn commit(
        &self,
        cursor: ScopedCursor,
        new_value: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, CursorStoreError> {
        let value = new_value.max(cursor.since);
        let mut state = self.state.lock().await;

        let mut next = *state;
        next.set(cursor.kind, value);
        self.storage.save(&next).await?;
        *state = next;

        debug!(kind = %cursor.kind, cursor = %value, "Committed cursor");
        Ok(value)
    }

    /// A copy of the last committed state.
    pub async fn snapshot(&self) -> CursorState {
        *self.state.lock().await
    }
}

//! In-memory state storage.

use async_trait::async_trait;
use std::sync::Mutex;

use crate::cursor::CursorState;
use crate::errors::CursorStoreError;
use crate::interfaces::StateStorage;

/// State storage that lives only as long as the process.
///
/// Useful for tests and for dry runs that must not touch the state file.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    state: Mutex<Option<CursorState>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: CursorState) -> Self {
        Self {
            state: Mutex::new(Some(state)),
        }
    }

    /// The last saved state, if any.
    pub fn stored(&self) -> Option<CursorState> {
        *self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl StateStorage for InMemoryStorage {
    async fn load(&self) -> Result<Option<CursorState>, CursorStoreError> {
        Ok(self.stored())
    }

    async fn save(&self, state: &CursorState) -> Result<(), CursorStoreError> {
        *self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(*state);
        Ok(())
    }
}

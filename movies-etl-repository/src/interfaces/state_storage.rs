//! Persistence seam for synchronization cursors.

use async_trait::async_trait;

use crate::cursor::CursorState;
use crate::errors::CursorStoreError;

/// Durable storage for the cursor record.
///
/// Implementations must replace the stored state atomically: a reader sees
/// either the previous state or the new one, never a partial write.
#[async_trait]
pub trait StateStorage: Send + Sync {
    /// Read the stored state. `Ok(None)` means nothing has been stored yet.
    async fn load(&self) -> Result<Option<CursorState>, CursorStoreError>;

    /// Replace the stored state.
    async fn save(&self, state: &CursorState) -> Result<(), CursorStoreError>;
}

use thiserror::Error;

/// Represents errors that can occur while persisting cursor state.
#[derive(Debug, Error)]
pub enum CursorStoreError {
    #[error("State storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("State serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

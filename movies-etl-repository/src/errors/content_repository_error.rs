//! Error types for the content repository.

use thiserror::Error;

/// Errors raised while reading the content database.
///
/// `Database` wraps every `sqlx` failure; [`ContentRepositoryError::is_transient`]
/// tells connectivity problems apart from rows that do not have the expected
/// shape.
#[derive(Debug, Error)]
pub enum ContentRepositoryError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    /// A row decoded fine but holds a value the ETL does not understand.
    #[error("Invalid row: {0}")]
    InvalidRow(String),

    #[error("Invalid schema name: {0}")]
    InvalidSchema(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

impl ContentRepositoryError {
    pub fn invalid_row(msg: impl Into<String>) -> Self {
        Self::InvalidRow(msg.into())
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    /// Whether the failure is a connectivity problem that may go away on retry.
    ///
    /// Decode errors, missing columns and invalid rows are structural and
    /// never transient.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::DatabaseError(err) => is_transient_sqlx_error(err),
            Self::InvalidRow(_) | Self::InvalidSchema(_) | Self::Unsupported(_) => false,
        }
    }
}

fn is_transient_sqlx_error(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => true,
        sqlx::Error::Database(db_err) => db_err
            .code()
            .map(|code| is_connection_sqlstate(&code))
            .unwrap_or(false),
        _ => false,
    }
}

/// SQLSTATE class 08 (connection exception) and the 57P0x shutdown codes.
fn is_connection_sqlstate(code: &str) -> bool {
    code.starts_with("08") || matches!(code, "57P01" | "57P02" | "57P03")
}

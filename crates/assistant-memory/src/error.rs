//! Error taxonomy for the memory subsystem
//!
//! Every failure stays local to the unit of work (turn or summarization pass)
//! that raised it. Nothing here retries on its own.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MemoryError {
    /// Embedding provider unreachable or rejected the input.
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// Provider answered with a vector that cannot be persisted.
    #[error("invalid embedding: expected dimension {expected}, got {actual}")]
    InvalidEmbedding { expected: usize, actual: usize },

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("summarization failed: {0}")]
    Summarization(String),

    #[error("model call failed: {0}")]
    ModelCall(String),

    #[error("profile error: {0}")]
    Profile(String),

    #[error("invalid timestamp '{value}': {reason}")]
    Timestamp { value: String, reason: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl MemoryError {
    pub fn embedding(err: impl std::fmt::Display) -> Self {
        Self::Embedding(err.to_string())
    }

    pub fn model_call(err: impl std::fmt::Display) -> Self {
        Self::ModelCall(err.to_string())
    }

    /// Whether a caller could reasonably try the same operation again.
    /// Purely informational.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Embedding(_) | Self::ModelCall(_) | Self::Pool(_) => true,
            Self::Storage(rusqlite::Error::SqliteFailure(err, _)) => matches!(
                err.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, MemoryError>;

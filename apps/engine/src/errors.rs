use thiserror::Error;
use uuid::Uuid;

/// Engine-level error type.
///
/// Deliberately small: "nothing to parse" and "could not extract JSON" are
/// expected outcomes recorded as `ParsingStatus::NoData` / `Failed`, not
/// errors. Only storage and genuinely unexpected failures surface here,
/// and batch callers treat them as a per-record `error` status rather
/// than aborting.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Record not found: {0}")]
    NotFound(Uuid),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

//! Record store: the persistence seam of the engine.
//!
//! Reconciliation only ever talks to `RecordStore`, so backends swap
//! without touching the sync logic: Postgres in production, the in-memory
//! map in tests and local runs.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::EngineError;
use crate::models::analysis::AnalysisRow;
use crate::models::canonical::{CanonicalRecord, ParsingStatus};

/// Storage contract for analysis records.
///
/// Writes are last-write-wins per record; `persist` must write canonical
/// data and status atomically so a partially-written record can never be
/// observed. Retrying a write is safe: same id, same final state.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn fetch(&self, id: Uuid) -> Result<Option<AnalysisRow>, EngineError>;

    /// Fetches up to `limit` records still in `pending`, optionally
    /// restricted to a job. Batch runs select only through this, which is
    /// what makes concurrent batches over disjoint sets safe.
    async fn fetch_pending(
        &self,
        job_id: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<AnalysisRow>, EngineError>;

    /// Writes the canonical record, status, and warning in one atomic update.
    async fn persist(
        &self,
        id: Uuid,
        canonical: &CanonicalRecord,
        status: ParsingStatus,
        warning: Option<&str>,
    ) -> Result<(), EngineError>;

    /// Status-only transition (`failed`, `no_data`, `error`). Leaves any
    /// previously persisted canonical data untouched.
    async fn mark(
        &self,
        id: Uuid,
        status: ParsingStatus,
        warning: Option<&str>,
    ) -> Result<(), EngineError>;

    /// Puts a record back in `pending` so it can be reprocessed.
    async fn reset(&self, id: Uuid) -> Result<(), EngineError>;
}

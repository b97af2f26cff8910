#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::errors::EngineError;
use crate::models::analysis::AnalysisRow;
use crate::models::canonical::{CanonicalRecord, ParsingStatus};
use crate::store::RecordStore;

/// In-memory record store. Used by the sync tests and handy for local
/// dry-runs; mirrors the Postgres store's last-write-wins semantics.
#[derive(Default)]
pub struct MemoryRecordStore {
    rows: Mutex<HashMap<Uuid, AnalysisRow>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, row: AnalysisRow) {
        self.rows.lock().await.insert(row.id, row);
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn fetch(&self, id: Uuid) -> Result<Option<AnalysisRow>, EngineError> {
        Ok(self.rows.lock().await.get(&id).cloned())
    }

    async fn fetch_pending(
        &self,
        job_id: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<AnalysisRow>, EngineError> {
        let rows = self.rows.lock().await;
        let mut pending: Vec<AnalysisRow> = rows
            .values()
            .filter(|r| r.status == ParsingStatus::Pending.as_str())
            .filter(|r| job_id.is_none() || r.job_id == job_id)
            .cloned()
            .collect();
        pending.sort_by_key(|r| r.created_at);
        pending.truncate(limit.max(0) as usize);
        Ok(pending)
    }

    async fn persist(
        &self,
        id: Uuid,
        canonical: &CanonicalRecord,
        status: ParsingStatus,
        warning: Option<&str>,
    ) -> Result<(), EngineError> {
        let mut rows = self.rows.lock().await;
        let row = rows.get_mut(&id).ok_or(EngineError::NotFound(id))?;
        row.canonical =
            Some(serde_json::to_value(canonical).map_err(|e| EngineError::Internal(e.into()))?);
        row.status = status.as_str().to_string();
        row.parse_warning = warning.map(str::to_string);
        row.updated_at = chrono::Utc::now();
        Ok(())
    }

    async fn mark(
        &self,
        id: Uuid,
        status: ParsingStatus,
        warning: Option<&str>,
    ) -> Result<(), EngineError> {
        let mut rows = self.rows.lock().await;
        let row = rows.get_mut(&id).ok_or(EngineError::NotFound(id))?;
        row.status = status.as_str().to_string();
        row.parse_warning = warning.map(str::to_string);
        row.updated_at = chrono::Utc::now();
        Ok(())
    }

    async fn reset(&self, id: Uuid) -> Result<(), EngineError> {
        let mut rows = self.rows.lock().await;
        let row = rows.get_mut(&id).ok_or(EngineError::NotFound(id))?;
        row.status = ParsingStatus::Pending.as_str().to_string();
        row.parse_warning = None;
        row.updated_at = chrono::Utc::now();
        Ok(())
    }
}

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::errors::EngineError;
use crate::models::analysis::AnalysisRow;
use crate::models::canonical::{CanonicalRecord, ParsingStatus};
use crate::store::RecordStore;

/// Postgres-backed record store over the `analyses` table.
#[derive(Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn fetch(&self, id: Uuid) -> Result<Option<AnalysisRow>, EngineError> {
        Ok(
            sqlx::query_as::<_, AnalysisRow>("SELECT * FROM analyses WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn fetch_pending(
        &self,
        job_id: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<AnalysisRow>, EngineError> {
        Ok(sqlx::query_as::<_, AnalysisRow>(
            r#"
            SELECT * FROM analyses
            WHERE status = 'pending' AND ($1::uuid IS NULL OR job_id = $1)
            ORDER BY created_at
            LIMIT $2
            "#,
        )
        .bind(job_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn persist(
        &self,
        id: Uuid,
        canonical: &CanonicalRecord,
        status: ParsingStatus,
        warning: Option<&str>,
    ) -> Result<(), EngineError> {
        // Single UPDATE: canonical data and status land together or not at all.
        let canonical_json =
            serde_json::to_value(canonical).map_err(|e| EngineError::Internal(e.into()))?;
        sqlx::query(
            r#"
            UPDATE analyses
            SET canonical = $2, status = $3, parse_warning = $4, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(canonical_json)
        .bind(status.as_str())
        .bind(warning)
        .execute(&self.pool)
        .await?;

        info!("Persisted canonical record for analysis {id} with status {status}");
        Ok(())
    }

    async fn mark(
        &self,
        id: Uuid,
        status: ParsingStatus,
        warning: Option<&str>,
    ) -> Result<(), EngineError> {
        sqlx::query(
            "UPDATE analyses SET status = $2, parse_warning = $3, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(status.as_str())
        .bind(warning)
        .execute(&self.pool)
        .await?;

        info!("Marked analysis {id} as {status}");
        Ok(())
    }

    async fn reset(&self, id: Uuid) -> Result<(), EngineError> {
        sqlx::query(
            "UPDATE analyses SET status = 'pending', parse_warning = NULL, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        info!("Reset analysis {id} for reprocessing");
        Ok(())
    }
}

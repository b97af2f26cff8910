#![allow(dead_code)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// One row of the `analyses` table.
///
/// `raw_response` is the untyped envelope from the upstream model call,
/// the one deliberately shapeless boundary in the system. `canonical` holds
/// the serialized `CanonicalRecord` once reconciliation succeeds.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AnalysisRow {
    pub id: Uuid,
    pub job_id: Option<Uuid>,
    pub source_text: String,
    pub raw_response: Option<Value>,
    /// Literal substrings known true of the source document, keyed by the
    /// canonical field they cover (`name`, `recent_employer`, `recent_title`).
    pub expected_markers: Option<Value>,
    pub canonical: Option<Value>,
    pub status: String,
    pub parse_warning: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

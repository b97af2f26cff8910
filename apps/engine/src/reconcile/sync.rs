#![allow(dead_code)]

//! Reconciliation Sync drives one record (or a batch) through
//! Locator → Repair → Canonicalizer → Normalizer → Verifier and persists
//! the result exactly once.
//!
//! Status state machine: `pending → {success, failed, no_data, error}`.
//! Terminal states only re-enter `pending` through an explicit reset, and
//! batches select by `pending` status, so duplicate or concurrent
//! invocations never double-process a record. One record's failure never
//! aborts a batch.

use std::collections::HashMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::EngineError;
use crate::models::analysis::AnalysisRow;
use crate::models::canonical::{CanonicalRecord, ParsingStatus};
use crate::reconcile::canonical::canonicalize;
use crate::reconcile::locator::{self, Payload};
use crate::reconcile::repair;
use crate::reconcile::verify;
use crate::store::RecordStore;

/// Selects which pending records a batch run considers.
#[derive(Debug, Clone, Default)]
pub struct BatchSelector {
    pub job_id: Option<Uuid>,
    pub limit: i64,
}

impl BatchSelector {
    pub fn with_limit(limit: i64) -> Self {
        Self {
            job_id: None,
            limit,
        }
    }
}

/// Batch outcome counts. `processed` covers records that reached `success`
/// or `no_data`; `failed` covers `failed` and `error`; `skipped` counts
/// records another run already moved to a terminal state between selection
/// and processing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub processed: u64,
    pub skipped: u64,
    pub failed: u64,
    pub total: u64,
}

/// Result of reconciling a single record.
#[derive(Debug, Clone)]
pub struct ReconcileOutcome {
    pub status: ParsingStatus,
    pub canonical: Option<CanonicalRecord>,
    /// True when the record was already terminal and nothing was written.
    pub skipped: bool,
}

enum Disposition {
    NoData,
    Failed(String),
    Success {
        canonical: CanonicalRecord,
        warning: Option<String>,
    },
}

/// Reconciles one record. Re-running on a terminal record is a no-op that
/// reports the stored state; only `pending` records are processed.
pub async fn reconcile_one(
    store: &dyn RecordStore,
    id: Uuid,
) -> Result<ReconcileOutcome, EngineError> {
    let row = store.fetch(id).await?.ok_or(EngineError::NotFound(id))?;

    let current = row
        .status
        .parse::<ParsingStatus>()
        .unwrap_or(ParsingStatus::Pending);
    if current.is_terminal() {
        debug!("analysis {id} already {current}, skipping");
        return Ok(ReconcileOutcome {
            status: current,
            canonical: stored_canonical(&row),
            skipped: true,
        });
    }

    match evaluate(&row) {
        Disposition::NoData => {
            store
                .mark(id, ParsingStatus::NoData, Some("no raw response attached"))
                .await?;
            Ok(ReconcileOutcome {
                status: ParsingStatus::NoData,
                canonical: None,
                skipped: false,
            })
        }
        Disposition::Failed(note) => {
            info!("analysis {id} failed extraction: {note}");
            store.mark(id, ParsingStatus::Failed, Some(&note)).await?;
            Ok(ReconcileOutcome {
                status: ParsingStatus::Failed,
                canonical: None,
                skipped: false,
            })
        }
        Disposition::Success { canonical, warning } => {
            match store
                .persist(id, &canonical, ParsingStatus::Success, warning.as_deref())
                .await
            {
                Ok(()) => Ok(ReconcileOutcome {
                    status: ParsingStatus::Success,
                    canonical: Some(canonical),
                    skipped: false,
                }),
                Err(e) => {
                    // Prior persisted canonical data stays untouched; only
                    // the status records that this attempt went wrong.
                    warn!("persisting analysis {id} failed: {e}");
                    if let Err(mark_err) = store
                        .mark(
                            id,
                            ParsingStatus::Error,
                            Some("persistence failed; prior canonical data left untouched"),
                        )
                        .await
                    {
                        warn!("marking analysis {id} as error also failed: {mark_err}");
                    }
                    Ok(ReconcileOutcome {
                        status: ParsingStatus::Error,
                        canonical: None,
                        skipped: false,
                    })
                }
            }
        }
    }
}

/// Reconciles a batch of pending records independently. Never raises: a
/// selection failure yields an empty report, per-record failures are
/// counted and the loop continues.
pub async fn reconcile_batch(store: &dyn RecordStore, selector: &BatchSelector) -> BatchReport {
    let rows = match store.fetch_pending(selector.job_id, selector.limit).await {
        Ok(rows) => rows,
        Err(e) => {
            warn!("batch selection failed: {e}");
            return BatchReport::default();
        }
    };

    let mut report = BatchReport {
        total: rows.len() as u64,
        ..Default::default()
    };

    for row in rows {
        match reconcile_one(store, row.id).await {
            Ok(outcome) if outcome.skipped => report.skipped += 1,
            Ok(outcome) => match outcome.status {
                ParsingStatus::Success | ParsingStatus::NoData => report.processed += 1,
                _ => report.failed += 1,
            },
            Err(e) => {
                warn!("reconciling analysis {} failed: {e}", row.id);
                report.failed += 1;
            }
        }
    }

    info!(
        "batch complete: {} processed, {} skipped, {} failed of {} total",
        report.processed, report.skipped, report.failed, report.total
    );
    report
}

/// Operator tooling: puts a record back in `pending` so the next batch
/// picks it up. The only transition out of a terminal state.
pub async fn reset_for_reprocessing(
    store: &dyn RecordStore,
    id: Uuid,
) -> Result<(), EngineError> {
    store.reset(id).await
}

// ────────────────────────────────────────────────────────────────────────────
// Per-record pipeline (pure over the fetched row)
// ────────────────────────────────────────────────────────────────────────────

fn evaluate(row: &AnalysisRow) -> Disposition {
    let raw = match row.raw_response.as_ref() {
        Some(v) if !v.is_null() => v,
        _ => return Disposition::NoData,
    };

    let Some(located) = locator::locate(raw) else {
        return Disposition::Failed("no locator strategy matched the envelope".to_string());
    };

    let strategy = located.strategy;
    let obj = match located.payload {
        Payload::Parsed(v) => v,
        Payload::Text(text) => match repair::repair(&text) {
            Some(v) => v,
            None => {
                return Disposition::Failed(format!(
                    "text repair failed (strategy: {})",
                    strategy.as_str()
                ))
            }
        },
    };

    let mut canonical = canonicalize(&obj);

    let markers = markers_from_row(row);
    let warning = if markers.is_empty() {
        None
    } else {
        let report = verify::verify(&canonical, &row.source_text, &markers);
        verify::apply_fallbacks(&mut canonical, &report)
    };

    Disposition::Success { canonical, warning }
}

fn markers_from_row(row: &AnalysisRow) -> HashMap<String, String> {
    row.expected_markers
        .as_ref()
        .and_then(|v| v.as_object())
        .map(|map| {
            map.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

fn stored_canonical(row: &AnalysisRow) -> Option<CanonicalRecord> {
    row.canonical
        .as_ref()
        .and_then(|v| serde_json::from_value(v.clone()).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryRecordStore;
    use async_trait::async_trait;
    use serde_json::{json, Value};

    fn make_row(raw: Option<Value>) -> AnalysisRow {
        AnalysisRow {
            id: Uuid::new_v4(),
            job_id: None,
            source_text: String::new(),
            raw_response: raw,
            expected_markers: None,
            canonical: None,
            status: "pending".to_string(),
            parse_warning: None,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    async fn insert(store: &MemoryRecordStore, row: AnalysisRow) -> Uuid {
        let id = row.id;
        store.insert(row).await;
        id
    }

    #[tokio::test]
    async fn test_scenario_a_parsed_object_envelope() {
        let store = MemoryRecordStore::new();
        let id = insert(
            &store,
            make_row(Some(json!({
                "parsedJson": { "Skills": ["sql", "python"], "Summary": "Strong analyst" }
            }))),
        )
        .await;

        let outcome = reconcile_one(&store, id).await.unwrap();
        assert_eq!(outcome.status, ParsingStatus::Success);

        let canonical = outcome.canonical.unwrap();
        assert_eq!(canonical.skills, vec!["sql", "python"]);
        assert_eq!(canonical.summary, "Strong analyst");
        assert!(canonical.work_history.is_empty());
        assert!(canonical.red_flags.is_empty());
        assert_eq!(canonical.score, 50);

        let row = store.fetch(id).await.unwrap().unwrap();
        assert_eq!(row.status, "success");
        assert!(row.canonical.is_some());
    }

    #[tokio::test]
    async fn test_scenario_b_fenced_raw_text() {
        let store = MemoryRecordStore::new();
        let id = insert(
            &store,
            make_row(Some(json!({
                "rawText": "```json\n{\"skills\": [\"go\"], \"matching_score\": 0.9}\n```"
            }))),
        )
        .await;

        let outcome = reconcile_one(&store, id).await.unwrap();
        assert_eq!(outcome.status, ParsingStatus::Success);

        let canonical = outcome.canonical.unwrap();
        assert_eq!(canonical.skills, vec!["go"]);
        assert_eq!(canonical.score, 90);
    }

    #[tokio::test]
    async fn test_scenario_c_missing_envelope_is_no_data() {
        let store = MemoryRecordStore::new();
        let id = insert(&store, make_row(None)).await;

        let outcome = reconcile_one(&store, id).await.unwrap();
        assert_eq!(outcome.status, ParsingStatus::NoData);
        assert!(outcome.canonical.is_none());

        let row = store.fetch(id).await.unwrap().unwrap();
        assert_eq!(row.status, "no_data");
        assert!(row.canonical.is_none());
    }

    #[tokio::test]
    async fn test_null_envelope_is_no_data() {
        let store = MemoryRecordStore::new();
        let id = insert(&store, make_row(Some(Value::Null))).await;

        let outcome = reconcile_one(&store, id).await.unwrap();
        assert_eq!(outcome.status, ParsingStatus::NoData);
    }

    #[tokio::test]
    async fn test_scenario_d_unlocatable_content_is_failed() {
        let store = MemoryRecordStore::new();
        let id = insert(&store, make_row(Some(json!({ "unrelatedField": 1 })))).await;

        let outcome = reconcile_one(&store, id).await.unwrap();
        assert_eq!(outcome.status, ParsingStatus::Failed);

        let row = store.fetch(id).await.unwrap().unwrap();
        assert_eq!(row.status, "failed");
        // Diagnostics name what was attempted, for later reprocessing.
        assert!(row.parse_warning.unwrap().contains("no locator strategy"));
    }

    #[tokio::test]
    async fn test_unrepairable_text_is_failed_with_strategy_note() {
        let store = MemoryRecordStore::new();
        let id = insert(
            &store,
            make_row(Some(json!({ "rawText": "{\"skills\": [\"go\"" }))),
        )
        .await;

        let outcome = reconcile_one(&store, id).await.unwrap();
        assert_eq!(outcome.status, ParsingStatus::Failed);

        let row = store.fetch(id).await.unwrap().unwrap();
        let warning = row.parse_warning.unwrap();
        assert!(warning.contains("text repair failed"));
        assert!(warning.contains("free_text"));
    }

    #[tokio::test]
    async fn test_reconcile_is_idempotent_without_reset() {
        let store = MemoryRecordStore::new();
        let id = insert(
            &store,
            make_row(Some(json!({ "parsedJson": { "skills": ["rust"] } }))),
        )
        .await;

        reconcile_one(&store, id).await.unwrap();
        let first = store.fetch(id).await.unwrap().unwrap();
        let first_canonical = serde_json::to_string(&first.canonical).unwrap();
        let first_updated = first.updated_at;

        let second_outcome = reconcile_one(&store, id).await.unwrap();
        assert!(second_outcome.skipped);
        assert_eq!(second_outcome.status, ParsingStatus::Success);

        let second = store.fetch(id).await.unwrap().unwrap();
        assert_eq!(serde_json::to_string(&second.canonical).unwrap(), first_canonical);
        assert_eq!(second.updated_at, first_updated);
    }

    #[tokio::test]
    async fn test_reset_reopens_terminal_record() {
        let store = MemoryRecordStore::new();
        let id = insert(
            &store,
            make_row(Some(json!({ "parsedJson": { "skills": [] } }))),
        )
        .await;

        reconcile_one(&store, id).await.unwrap();
        assert_eq!(store.fetch(id).await.unwrap().unwrap().status, "success");

        reset_for_reprocessing(&store, id).await.unwrap();
        assert_eq!(store.fetch(id).await.unwrap().unwrap().status, "pending");

        let outcome = reconcile_one(&store, id).await.unwrap();
        assert!(!outcome.skipped);
        assert_eq!(outcome.status, ParsingStatus::Success);
    }

    #[tokio::test]
    async fn test_reconcile_missing_record_is_not_found() {
        let store = MemoryRecordStore::new();
        let result = reconcile_one(&store, Uuid::new_v4()).await;
        assert!(matches!(result, Err(EngineError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_verification_substitutes_fabricated_employer() {
        let store = MemoryRecordStore::new();
        let mut row = make_row(Some(json!({
            "parsedJson": {
                "summary": "An executive at Initech.",
                "workHistory": [{ "title": "CTO", "company": "Initech" }]
            }
        })));
        row.source_text =
            "Jordan Reyes, Data Engineer at Acme Corp since 2020.".to_string();
        row.expected_markers = Some(json!({
            "recent_employer": "Acme Corp",
            "recent_title": "Data Engineer"
        }));
        let id = insert(&store, row).await;

        let outcome = reconcile_one(&store, id).await.unwrap();
        assert_eq!(outcome.status, ParsingStatus::Success);

        let canonical = outcome.canonical.unwrap();
        assert_eq!(canonical.work_history[0].company, "Acme Corp");
        assert_eq!(canonical.work_history[0].title, "Data Engineer");

        let stored = store.fetch(id).await.unwrap().unwrap();
        assert!(stored.parse_warning.unwrap().contains("confidence"));
    }

    #[tokio::test]
    async fn test_batch_processes_records_independently() {
        let store = MemoryRecordStore::new();
        insert(
            &store,
            make_row(Some(json!({ "parsedJson": { "skills": ["a"] } }))),
        )
        .await;
        insert(&store, make_row(Some(json!({ "unrelatedField": 1 })))).await;
        insert(&store, make_row(None)).await;

        let report = reconcile_batch(&store, &BatchSelector::with_limit(10)).await;
        assert_eq!(report.total, 3);
        assert_eq!(report.processed, 2); // success + no_data
        assert_eq!(report.failed, 1);
        assert_eq!(report.skipped, 0);
    }

    #[tokio::test]
    async fn test_batch_selects_only_pending() {
        let store = MemoryRecordStore::new();
        let mut done = make_row(Some(json!({ "parsedJson": {} })));
        done.status = "success".to_string();
        insert(&store, done).await;
        insert(
            &store,
            make_row(Some(json!({ "parsedJson": { "skills": [] } }))),
        )
        .await;

        let report = reconcile_batch(&store, &BatchSelector::with_limit(10)).await;
        assert_eq!(report.total, 1);
        assert_eq!(report.processed, 1);
    }

    #[tokio::test]
    async fn test_batch_respects_job_selector() {
        let store = MemoryRecordStore::new();
        let job = Uuid::new_v4();
        let mut in_job = make_row(Some(json!({ "parsedJson": {} })));
        in_job.job_id = Some(job);
        insert(&store, in_job).await;
        insert(&store, make_row(Some(json!({ "parsedJson": {} })))).await;

        let selector = BatchSelector {
            job_id: Some(job),
            limit: 10,
        };
        let report = reconcile_batch(&store, &selector).await;
        assert_eq!(report.total, 1);
    }

    // Store whose persist always fails, for exercising the error transition.
    struct PersistFailStore(MemoryRecordStore);

    #[async_trait]
    impl RecordStore for PersistFailStore {
        async fn fetch(&self, id: Uuid) -> Result<Option<AnalysisRow>, EngineError> {
            self.0.fetch(id).await
        }
        async fn fetch_pending(
            &self,
            job_id: Option<Uuid>,
            limit: i64,
        ) -> Result<Vec<AnalysisRow>, EngineError> {
            self.0.fetch_pending(job_id, limit).await
        }
        async fn persist(
            &self,
            _id: Uuid,
            _canonical: &CanonicalRecord,
            _status: ParsingStatus,
            _warning: Option<&str>,
        ) -> Result<(), EngineError> {
            Err(EngineError::Internal(anyhow::anyhow!(
                "storage unavailable"
            )))
        }
        async fn mark(
            &self,
            id: Uuid,
            status: ParsingStatus,
            warning: Option<&str>,
        ) -> Result<(), EngineError> {
            self.0.mark(id, status, warning).await
        }
        async fn reset(&self, id: Uuid) -> Result<(), EngineError> {
            self.0.reset(id).await
        }
    }

    #[tokio::test]
    async fn test_persist_failure_becomes_error_status() {
        let store = PersistFailStore(MemoryRecordStore::new());
        let id = insert(
            &store.0,
            make_row(Some(json!({ "parsedJson": { "skills": ["a"] } }))),
        )
        .await;

        let outcome = reconcile_one(&store, id).await.unwrap();
        assert_eq!(outcome.status, ParsingStatus::Error);
        assert!(outcome.canonical.is_none());

        let row = store.fetch(id).await.unwrap().unwrap();
        assert_eq!(row.status, "error");
        // The failed attempt's output was never written.
        assert!(row.canonical.is_none());
    }
}

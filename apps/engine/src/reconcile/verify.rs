//! Consistency Verifier estimates how likely the canonicalized content
//! is fabricated, by checking it against literal substrings known to be
//! true of the source document.
//!
//! Markers are supplied by the caller (typically from the record's
//! `expected_markers` column), never invented here. A marker that does not
//! appear in the source text cannot be checked and is vacuously satisfied.
//! Verification degrades gracefully: low confidence swaps in literal
//! source-derived values and attaches a warning, it never blocks
//! persistence.

use serde::Serialize;
use std::collections::HashMap;

use crate::models::canonical::{CanonicalRecord, WorkItem};

/// Below this confidence the caller should prefer literal source values
/// over model-derived ones for the fields the failing markers cover.
pub const CONFIDENCE_THRESHOLD: u32 = 85;

/// Marker keys with a known canonical-field mapping for fallback
/// substitution.
const FIELD_RECENT_EMPLOYER: &str = "recent_employer";
const FIELD_RECENT_TITLE: &str = "recent_title";

#[derive(Debug, Clone, Serialize)]
pub struct MarkerCheck {
    pub field: String,
    pub marker: String,
    pub satisfied: bool,
}

/// Ephemeral verification result. Not persisted as its own entity; only
/// the derived warning string reaches the record.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationReport {
    /// Checkable markers only; markers absent from the source text are
    /// excluded and do not count against the confidence.
    pub checks: Vec<MarkerCheck>,
    pub checked: u32,
    pub satisfied: u32,
    /// 0–100. 100 when nothing was checkable.
    pub confidence: u32,
}

impl VerificationReport {
    pub fn is_trusted(&self) -> bool {
        self.confidence >= CONFIDENCE_THRESHOLD
    }
}

/// Cross-checks the canonical record against the source document.
///
/// A marker is satisfied when its literal text appears (case-insensitive)
/// anywhere in the serialized canonical record. Markers whose text does
/// not appear in `source_text` are vacuously satisfied and skipped.
pub fn verify(
    canonical: &CanonicalRecord,
    source_text: &str,
    markers: &HashMap<String, String>,
) -> VerificationReport {
    let serialized = serde_json::to_string(canonical)
        .unwrap_or_default()
        .to_lowercase();
    let source = source_text.to_lowercase();

    // Sort for a deterministic report independent of map iteration order.
    let mut keys: Vec<&String> = markers.keys().collect();
    keys.sort();

    let mut checks = Vec::new();
    for key in keys {
        let marker = markers[key].trim();
        if marker.is_empty() {
            continue;
        }
        let needle = marker.to_lowercase();
        if !source.contains(&needle) {
            // Cannot be checked against this source; vacuously satisfied.
            continue;
        }
        checks.push(MarkerCheck {
            field: key.clone(),
            marker: marker.to_string(),
            satisfied: serialized.contains(&needle),
        });
    }

    let checked = checks.len() as u32;
    let satisfied = checks.iter().filter(|c| c.satisfied).count() as u32;
    let confidence = if checked == 0 {
        100
    } else {
        ((satisfied as f64 / checked as f64) * 100.0).round() as u32
    };

    VerificationReport {
        checks,
        checked,
        satisfied,
        confidence,
    }
}

/// When confidence is below threshold, substitutes literal marker values
/// for the canonical fields the failing markers cover and returns a
/// human-readable warning. Trusted reports leave the record untouched.
pub fn apply_fallbacks(
    canonical: &mut CanonicalRecord,
    report: &VerificationReport,
) -> Option<String> {
    if report.is_trusted() {
        return None;
    }

    let mut substituted: Vec<String> = Vec::new();
    let mut unverified: Vec<String> = Vec::new();

    for check in report.checks.iter().filter(|c| !c.satisfied) {
        match check.field.as_str() {
            FIELD_RECENT_EMPLOYER => {
                first_work_item(canonical).company = check.marker.clone();
                substituted.push(check.field.clone());
            }
            FIELD_RECENT_TITLE => {
                first_work_item(canonical).title = check.marker.clone();
                substituted.push(check.field.clone());
            }
            // No canonical field maps to this marker; flag it for review.
            _ => unverified.push(check.field.clone()),
        }
    }

    let mut warning = format!(
        "Verification confidence {}% is below the {}% threshold.",
        report.confidence, CONFIDENCE_THRESHOLD
    );
    if !substituted.is_empty() {
        warning.push_str(&format!(
            " Source-derived values substituted for: {}.",
            substituted.join(", ")
        ));
    }
    if !unverified.is_empty() {
        warning.push_str(&format!(
            " Unverified fields kept as-is: {}.",
            unverified.join(", ")
        ));
    }

    Some(warning)
}

fn first_work_item(canonical: &mut CanonicalRecord) -> &mut WorkItem {
    if canonical.work_history.is_empty() {
        canonical.work_history.push(WorkItem::default());
    }
    &mut canonical.work_history[0]
}

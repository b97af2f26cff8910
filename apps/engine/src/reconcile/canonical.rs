//! Field Canonicalizer maps an arbitrary parsed object onto the
//! canonical schema.
//!
//! Years of prompt changes left the upstream responses with many spellings
//! for each field (`Skills`, `skill_list`, `work history`, ...). Each
//! canonical field keeps an ordered accepted-key list; the first key
//! present wins, even when its value is empty, and keys are never merged.
//! Values of the wrong structural type fall back to the field default, and
//! array entries of the wrong shape are coerced per-entry instead of being
//! dropped.
//!
//! `canonicalize` is total: any object in, a fully-populated
//! `CanonicalRecord` out. It never panics and never returns partial fields.

use serde_json::{Map, Value};

use crate::models::canonical::{CanonicalRecord, WorkItem};
use crate::reconcile::score::normalize_score;

// ────────────────────────────────────────────────────────────────────────────
// Accepted key spellings, in priority order
// ────────────────────────────────────────────────────────────────────────────

const SKILLS_KEYS: &[&str] = &[
    "skills",
    "Skills",
    "skill_list",
    "skillList",
    "skills_list",
    "key_skills",
    "keySkills",
    "technical_skills",
    "technicalSkills",
    "extracted_skills",
    "competencies",
];

const WORK_HISTORY_KEYS: &[&str] = &[
    "workHistory",
    "work_history",
    "WorkHistory",
    "Work History",
    "work history",
    "employment_history",
    "employmentHistory",
    "employment",
    "work_experience",
    "workExperience",
    "experience",
    "experiences",
    "Experience",
    "positions",
    "jobs",
    "career_history",
];

const RED_FLAGS_KEYS: &[&str] = &[
    "redFlags",
    "red_flags",
    "RedFlags",
    "Red Flags",
    "red flags",
    "concerns",
    "warnings",
    "flags",
    "risk_factors",
    "riskFactors",
];

const SUMMARY_KEYS: &[&str] = &[
    "summary",
    "Summary",
    "professional_summary",
    "professionalSummary",
    "profile_summary",
    "profileSummary",
    "candidate_summary",
    "candidateSummary",
    "analysis_summary",
    "overview",
];

const SCORE_KEYS: &[&str] = &[
    "score",
    "Score",
    "matching_score",
    "matchingScore",
    "match_score",
    "matchScore",
    "overall_score",
    "overallScore",
    "fit_score",
    "fitScore",
    "rating",
];

// Work-history entries have their own spelling drift.
const ITEM_TITLE_KEYS: &[&str] = &[
    "title",
    "Title",
    "job_title",
    "jobTitle",
    "position",
    "role",
    "designation",
];
const ITEM_COMPANY_KEYS: &[&str] = &[
    "company",
    "Company",
    "employer",
    "organization",
    "organisation",
    "company_name",
    "companyName",
];
const ITEM_LOCATION_KEYS: &[&str] = &["location", "Location", "city", "place"];
const ITEM_START_KEYS: &[&str] = &[
    "startDate",
    "start_date",
    "Start Date",
    "start",
    "from",
    "date_start",
];
const ITEM_END_KEYS: &[&str] = &["endDate", "end_date", "End Date", "end", "to", "date_end"];
const ITEM_DURATION_KEYS: &[&str] = &["durationMonths", "duration_months", "duration", "months"];
const ITEM_CURRENT_KEYS: &[&str] = &[
    "isCurrentRole",
    "is_current_role",
    "is_current",
    "current",
    "currentRole",
];

/// Keys under which a nested container may hold the actual work-history array.
const NESTED_LIST_KEYS: &[&str] = &["items", "entries", "positions", "history", "list"];

/// Name-like sub-fields used to coerce object entries into strings.
const NAME_LIKE_KEYS: &[&str] = &["name", "skill", "title", "value", "text", "label"];

// ────────────────────────────────────────────────────────────────────────────
// Canonicalization
// ────────────────────────────────────────────────────────────────────────────

/// Canonicalizes any parsed object into a fully-populated `CanonicalRecord`.
/// Non-object input yields the all-default record.
pub fn canonicalize(obj: &Value) -> CanonicalRecord {
    let Some(map) = obj.as_object() else {
        return CanonicalRecord::default();
    };

    CanonicalRecord {
        skills: resolve_first(map, SKILLS_KEYS)
            .map(coerce_string_array)
            .unwrap_or_default(),
        work_history: resolve_first(map, WORK_HISTORY_KEYS)
            .map(coerce_work_history)
            .unwrap_or_default(),
        red_flags: resolve_first(map, RED_FLAGS_KEYS)
            .map(coerce_string_array)
            .unwrap_or_default(),
        summary: resolve_first(map, SUMMARY_KEYS)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        score: normalize_score(resolve_first(map, SCORE_KEYS)),
    }
}

/// Returns the value of the first accepted key present in the object.
/// Presence alone decides: an empty or falsy value still wins over a
/// later, populated spelling. Keys are never merged.
fn resolve_first<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| map.get(*k))
}

/// Coerces a value expected to be `string[]`. Non-array values fall back to
/// the default; entries of the wrong shape are coerced per-entry rather
/// than dropped.
fn coerce_string_array(value: &Value) -> Vec<String> {
    let Some(arr) = value.as_array() else {
        return Vec::new();
    };
    arr.iter().map(coerce_entry_to_string).collect()
}

/// Coerces a single array entry to a string: use it directly if it is one,
/// else extract a name-like sub-field, else stringify.
fn coerce_entry_to_string(entry: &Value) -> String {
    if let Some(s) = entry.as_str() {
        return s.to_string();
    }
    if let Some(map) = entry.as_object() {
        if let Some(name) = resolve_first(map, NAME_LIKE_KEYS).and_then(Value::as_str) {
            return name.to_string();
        }
    }
    // Last resort: compact JSON text of the entry.
    entry.to_string()
}

fn coerce_work_history(value: &Value) -> Vec<WorkItem> {
    let arr = match value {
        Value::Array(arr) => arr,
        // Nested container: { "positions": [...] } and friends.
        Value::Object(map) => match resolve_first(map, NESTED_LIST_KEYS).and_then(Value::as_array)
        {
            Some(arr) => arr,
            None => return Vec::new(),
        },
        _ => return Vec::new(),
    };
    arr.iter().map(coerce_work_item).collect()
}

fn coerce_work_item(entry: &Value) -> WorkItem {
    let Some(map) = entry.as_object() else {
        // A bare string entry is kept as a title-only item.
        return WorkItem {
            title: entry.as_str().map(str::to_string).unwrap_or_default(),
            ..Default::default()
        };
    };

    WorkItem {
        title: resolve_string(map, ITEM_TITLE_KEYS),
        company: resolve_string(map, ITEM_COMPANY_KEYS),
        location: resolve_opt_string(map, ITEM_LOCATION_KEYS),
        start_date: resolve_opt_string(map, ITEM_START_KEYS),
        end_date: resolve_opt_string(map, ITEM_END_KEYS),
        duration_months: resolve_first(map, ITEM_DURATION_KEYS).and_then(coerce_i32),
        is_current_role: resolve_first(map, ITEM_CURRENT_KEYS).and_then(coerce_bool),
    }
}

fn resolve_string(map: &Map<String, Value>, keys: &[&str]) -> String {
    resolve_first(map, keys)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn resolve_opt_string(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    resolve_first(map, keys)
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn coerce_i32(value: &Value) -> Option<i32> {
    match value {
        Value::Number(n) => n.as_f64().map(|f| f.round() as i32),
        Value::String(s) => s.trim().parse::<f64>().ok().map(|f| f.round() as i32),
        _ => None,
    }
}

fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" => Some(true),
            "false" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

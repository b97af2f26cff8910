//! Canonical analysis record: the fixed-shape, always-fully-populated
//! result of reconciliation.
//!
//! Every field has a deterministic default (`[]`, `""`, `0`). Absence of
//! evidence is represented by the default, never by a missing field, so a
//! `CanonicalRecord` can always be serialized, compared, and persisted
//! without null checks downstream.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One position in the candidate's work history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkItem {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub company: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_months: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_current_role: Option<bool>,
}

/// The single source of truth per analysis. Serializes with camelCase keys
/// (`workHistory`, `redFlags`), the canonical wire shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalRecord {
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub work_history: Vec<WorkItem>,
    #[serde(default)]
    pub red_flags: Vec<String>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub score: i32,
}

/// Per-record parsing status. Stored as text in the `analyses.status` column.
///
/// `pending` is the only non-terminal state. Re-entry to `pending` (via
/// `reset_for_reprocessing`) is the only way out of a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParsingStatus {
    Pending,
    Success,
    Failed,
    NoData,
    Error,
}

impl ParsingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParsingStatus::Pending => "pending",
            ParsingStatus::Success => "success",
            ParsingStatus::Failed => "failed",
            ParsingStatus::NoData => "no_data",
            ParsingStatus::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ParsingStatus::Pending)
    }
}

impl fmt::Display for ParsingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParsingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ParsingStatus::Pending),
            "success" => Ok(ParsingStatus::Success),
            "failed" => Ok(ParsingStatus::Failed),
            "no_data" => Ok(ParsingStatus::NoData),
            "error" => Ok(ParsingStatus::Error),
            other => Err(format!("unknown parsing status: {other}")),
        }
    }
}

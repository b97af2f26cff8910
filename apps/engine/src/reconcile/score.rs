//! Score Normalizer rescales a score of unknown range to an integer
//! 0..=100.
//!
//! Upstream prompts have asked for scores on 0–1, 0–10, and 0–100 scales
//! at different times, and some responses omit the score entirely. The
//! three ranges are mutually exclusive by construction, so `0.85`, `8.5`
//! and `85` all land on 85.

use serde_json::Value;

/// Neutral midpoint used when no score can be recovered. Deliberately not
/// zero: an unparseable score must not bias downstream ranking against the
/// record.
const NEUTRAL_SCORE: i32 = 50;

/// Normalizes a score-like value to an integer in `[0, 100]`.
///
/// Absent or non-coercible values take the neutral midpoint 50. Values in
/// `(0, 1]` are treated as fractions, values in `(1, 10)` as a 0–10 scale,
/// everything else as already 0–100. The result is rounded and clamped.
pub fn normalize_score(raw: Option<&Value>) -> i32 {
    let Some(n) = raw.and_then(coerce_f64).filter(|n| n.is_finite()) else {
        return NEUTRAL_SCORE;
    };

    let scaled = if n > 0.0 && n <= 1.0 {
        n * 100.0
    } else if n > 1.0 && n < 10.0 {
        n * 10.0
    } else {
        n
    };

    scaled.round().clamp(0.0, 100.0) as i32
}

fn coerce_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok(),
        _ => None,
    }
}

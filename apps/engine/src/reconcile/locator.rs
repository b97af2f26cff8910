//! Payload Locator finds the sub-object of a raw envelope that actually
//! holds analysis content.
//!
//! Upstream model integrations have wrapped their output in every shape
//! imaginable: a parsed object under `parsedJson`, the same thing one level
//! down inside a retry/proxy wrapper, a pre-split `sections` container, or
//! a free-text blob with JSON buried in markdown. All of that shape
//! knowledge lives here and nowhere else; callers get back either a parsed
//! object or a text candidate for `repair`, never raw traversal code.
//!
//! The strategy list is ordered and first-match-wins: once a strategy
//! produces a candidate, later strategies are never consulted, even if the
//! candidate turns out to be unrepairable.

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;
use tracing::debug;

/// Fields that hold an already-parsed analysis object.
const PARSED_FIELDS: &[&str] = &[
    "parsedJson",
    "parsed_json",
    "parsedData",
    "parsed_data",
    "analysis",
    "analysisResult",
    "result",
    "data",
];

/// Conventional wrapper fields added by retry/proxy layers.
const WRAPPER_FIELDS: &[&str] = &[
    "response",
    "output",
    "completion",
    "message",
    "body",
    "payload",
];

/// Fields that hold free text with JSON (possibly fenced) inside.
const TEXT_FIELDS: &[&str] = &[
    "rawText",
    "raw_text",
    "rawResponse",
    "raw_response",
    "text",
    "content",
    "raw",
];

/// Greedy match over the widest `{...}` span. The repair step narrows this
/// down with a real brace-balancing scan; the regex only has to find where
/// JSON-shaped content starts and ends at all.
static JSON_SPAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*\}").expect("JSON span regex is valid"));

/// Which strategy produced the candidate. Recorded in diagnostics so failed
/// records can be re-examined after upstream prompt changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    DirectField,
    WrappedField,
    Sections,
    FreeText,
    WrappedFreeText,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::DirectField => "direct_field",
            Strategy::WrappedField => "wrapped_field",
            Strategy::Sections => "sections",
            Strategy::FreeText => "free_text",
            Strategy::WrappedFreeText => "wrapped_free_text",
        }
    }
}

/// What the locator found: a parsed object ready for canonicalization, or
/// a text span that still needs repair.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Parsed(Value),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Located {
    pub payload: Payload,
    pub strategy: Strategy,
}

/// Locates analysis content inside an envelope of unknown shape.
///
/// Pure function: diagnostics go to the log, never into the result.
/// `None` means "no extractable content", which is a valid outcome, not an
/// error.
pub fn locate(envelope: &Value) -> Option<Located> {
    // An envelope that is itself a string is a free-text candidate.
    if let Value::String(text) = envelope {
        return text_candidate(text, Strategy::FreeText);
    }

    let obj = envelope.as_object()?;

    // 1. Direct parsed-object field.
    for field in PARSED_FIELDS {
        if let Some(v) = obj.get(*field) {
            if v.is_object() {
                debug!(field, "located parsed object directly");
                return Some(Located {
                    payload: Payload::Parsed(v.clone()),
                    strategy: Strategy::DirectField,
                });
            }
        }
    }

    // 2. The same fields one level down inside a wrapper.
    for wrapper in WRAPPER_FIELDS {
        if let Some(inner) = obj.get(*wrapper).and_then(Value::as_object) {
            for field in PARSED_FIELDS {
                if let Some(v) = inner.get(*field) {
                    if v.is_object() {
                        debug!(wrapper, field, "located parsed object inside wrapper");
                        return Some(Located {
                            payload: Payload::Parsed(v.clone()),
                            strategy: Strategy::WrappedField,
                        });
                    }
                }
            }
        }
    }

    // 3. A `sections` container, one or two levels deep.
    if let Some(sections) = find_sections(obj) {
        debug!("located sections container");
        return Some(Located {
            payload: Payload::Parsed(sections),
            strategy: Strategy::Sections,
        });
    }

    // 4. A free-text field scanned for a `{...}` span.
    for field in TEXT_FIELDS {
        if let Some(text) = obj.get(*field).and_then(Value::as_str) {
            if let Some(found) = text_candidate(text, Strategy::FreeText) {
                debug!(field, "located free-text candidate");
                return Some(found);
            }
        }
    }

    // 5. The same free-text search one level deeper.
    for wrapper in WRAPPER_FIELDS {
        if let Some(inner) = obj.get(*wrapper).and_then(Value::as_object) {
            for field in TEXT_FIELDS {
                if let Some(text) = inner.get(*field).and_then(Value::as_str) {
                    if let Some(found) = text_candidate(text, Strategy::WrappedFreeText) {
                        debug!(wrapper, field, "located wrapped free-text candidate");
                        return Some(found);
                    }
                }
            }
        }
    }

    debug!("no locator strategy matched");
    None
}

fn text_candidate(text: &str, strategy: Strategy) -> Option<Located> {
    let span = JSON_SPAN.find(text)?;
    Some(Located {
        payload: Payload::Text(span.as_str().to_string()),
        strategy,
    })
}

fn find_sections(obj: &Map<String, Value>) -> Option<Value> {
    if let Some(sections) = obj.get("sections").filter(|v| v.is_object()) {
        return Some(sections.clone());
    }
    for wrapper in WRAPPER_FIELDS.iter().chain(PARSED_FIELDS) {
        if let Some(inner) = obj.get(*wrapper).and_then(Value::as_object) {
            if let Some(sections) = inner.get("sections").filter(|v| v.is_object()) {
                return Some(sections.clone());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_direct_parsed_field() {
        let envelope = json!({ "parsedJson": { "skills": ["sql"] } });
        let located = locate(&envelope).unwrap();
        assert_eq!(located.strategy, Strategy::DirectField);
        assert_eq!(located.payload, Payload::Parsed(json!({ "skills": ["sql"] })));
    }

    #[test]
    fn test_first_parsed_field_wins() {
        let envelope = json!({
            "analysis": { "summary": "from analysis" },
            "parsedJson": { "summary": "from parsedJson" }
        });
        // parsedJson outranks analysis in the fixed priority order
        let located = locate(&envelope).unwrap();
        assert_eq!(
            located.payload,
            Payload::Parsed(json!({ "summary": "from parsedJson" }))
        );
    }

    #[test]
    fn test_wrapped_parsed_field() {
        let envelope = json!({ "response": { "result": { "skills": [] } } });
        let located = locate(&envelope).unwrap();
        assert_eq!(located.strategy, Strategy::WrappedField);
    }

    #[test]
    fn test_sections_container() {
        let envelope = json!({ "sections": { "skills": ["go"], "summary": "x" } });
        let located = locate(&envelope).unwrap();
        assert_eq!(located.strategy, Strategy::Sections);
    }

    #[test]
    fn test_nested_sections_container() {
        let envelope = json!({ "output": { "sections": { "summary": "deep" } } });
        let located = locate(&envelope).unwrap();
        assert_eq!(located.strategy, Strategy::Sections);
        assert_eq!(located.payload, Payload::Parsed(json!({ "summary": "deep" })));
    }

    #[test]
    fn test_free_text_field_yields_span() {
        let envelope = json!({ "rawText": "Here you go:\n{\"skills\": [\"go\"]}\nDone." });
        let located = locate(&envelope).unwrap();
        assert_eq!(located.strategy, Strategy::FreeText);
        assert_eq!(
            located.payload,
            Payload::Text("{\"skills\": [\"go\"]}".to_string())
        );
    }

    #[test]
    fn test_wrapped_free_text() {
        let envelope = json!({ "message": { "content": "{\"summary\": \"hi\"}" } });
        let located = locate(&envelope).unwrap();
        assert_eq!(located.strategy, Strategy::WrappedFreeText);
    }

    #[test]
    fn test_string_envelope_is_free_text() {
        let envelope = json!("prefix {\"score\": 5} suffix");
        let located = locate(&envelope).unwrap();
        assert_eq!(located.strategy, Strategy::FreeText);
        assert_eq!(located.payload, Payload::Text("{\"score\": 5}".to_string()));
    }

    #[test]
    fn test_parsed_field_outranks_free_text() {
        let envelope = json!({
            "rawText": "{\"summary\": \"text\"}",
            "data": { "summary": "object" }
        });
        let located = locate(&envelope).unwrap();
        assert_eq!(located.strategy, Strategy::DirectField);
    }

    #[test]
    fn test_unrelated_object_returns_none() {
        assert_eq!(locate(&json!({ "unrelatedField": 1 })), None);
    }

    #[test]
    fn test_text_without_braces_returns_none() {
        assert_eq!(locate(&json!({ "rawText": "no json here" })), None);
    }

    #[test]
    fn test_scalar_envelope_returns_none() {
        assert_eq!(locate(&json!(42)), None);
        assert_eq!(locate(&json!(null)), None);
    }
}

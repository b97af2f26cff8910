//! Text Repair turns near-JSON model output into parseable JSON.
//!
//! Models wrap JSON in markdown fences, emit Python literals (`True`,
//! `None`), leave enumeration words unquoted, and truncate mid-document.
//! The rewrites here are safe because they only touch tokens that are never
//! valid as user content in this domain: nothing inside a string literal is
//! ever modified.
//!
//! Strategy: normalize then strict-parse; if that fails, scan the text for
//! maximal brace-balanced spans and try each one the same way. Every
//! failure path is `None`; this module never panics.

use serde_json::Value;

/// Repairs a text candidate into a parsed JSON object.
/// Returns `None` when no object-shaped JSON can be recovered.
pub fn repair(candidate: &str) -> Option<Value> {
    let stripped = strip_code_fences(candidate);

    if let Some(obj) = parse_normalized(stripped) {
        return Some(obj);
    }

    // Rescue scan: try each maximal balanced {...} span in order.
    for span in balanced_spans(stripped) {
        if let Some(obj) = parse_normalized(span) {
            return Some(obj);
        }
    }

    None
}

fn parse_normalized(text: &str) -> Option<Value> {
    let normalized = strip_trailing_commas(&quote_bare_tokens(text));
    serde_json::from_str::<Value>(&normalized)
        .ok()
        .filter(Value::is_object)
}

/// Strips ```json ... ``` or ``` ... ``` code fences from model output.
fn strip_code_fences(text: &str) -> &str {
    let text = text.trim();
    let body = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```JSON"))
        .or_else(|| text.strip_prefix("```"));
    match body {
        Some(body) => {
            let body = body.trim_start();
            body.strip_suffix("```").map(str::trim).unwrap_or(body)
        }
        None => text,
    }
}

/// Rewrites bare identifier tokens outside string literals:
/// `True`/`False` become JSON booleans, `None` becomes `null`, and any
/// other bare word in value position (after `:`, `[`, or an array comma)
/// is wrapped in quotes. Bare words in key position are left alone.
fn quote_bare_tokens(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    let mut chars = text.char_indices().peekable();
    let mut in_string = false;
    let mut escaped = false;
    // Container stack so a comma can be classified as array (value follows)
    // or object (key follows).
    let mut stack: Vec<char> = Vec::new();
    let mut value_position = false;

    while let Some((_, c)) = chars.next() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                value_position = false;
                out.push(c);
            }
            '{' => {
                stack.push('{');
                value_position = false;
                out.push(c);
            }
            '[' => {
                stack.push('[');
                value_position = true;
                out.push(c);
            }
            '}' | ']' => {
                stack.pop();
                value_position = false;
                out.push(c);
            }
            ':' => {
                value_position = true;
                out.push(c);
            }
            ',' => {
                value_position = stack.last() == Some(&'[');
                out.push(c);
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut word = String::new();
                word.push(c);
                while let Some(&(_, next)) = chars.peek() {
                    if next.is_ascii_alphanumeric() || next == '_' {
                        word.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                // An `e`/`E` run directly after a digit is the exponent of a
                // number literal (`1e5`, `2.5E+10`), not a bare word.
                if is_exponent_suffix(&word, &out) {
                    out.push_str(&word);
                    continue;
                }
                out.push_str(&rewrite_word(&word, value_position));
                if value_position {
                    value_position = false;
                }
            }
            _ => out.push(c),
        }
    }

    out
}

fn is_exponent_suffix(word: &str, out: &str) -> bool {
    let mut rest = word.chars();
    matches!(rest.next(), Some('e') | Some('E'))
        && rest.all(|c| c.is_ascii_digit())
        && matches!(out.chars().last(), Some(p) if p.is_ascii_digit() || p == '.')
}

fn rewrite_word(word: &str, value_position: bool) -> String {
    match word {
        "true" | "false" | "null" => word.to_string(),
        "True" => "true".to_string(),
        "False" => "false".to_string(),
        "None" => "null".to_string(),
        _ if value_position => format!("\"{word}\""),
        _ => word.to_string(),
    }
}

/// Removes commas that directly precede a closing bracket or brace.
fn strip_trailing_commas(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;
    let chars: Vec<char> = text.chars().collect();

    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        if c == '"' {
            in_string = true;
            out.push(c);
            continue;
        }
        if c == ',' {
            let next = chars[i + 1..].iter().find(|ch| !ch.is_whitespace());
            if matches!(next, Some('}') | Some(']')) {
                continue;
            }
        }
        out.push(c);
    }

    out
}

/// Yields every brace-balanced `{...}` span, outermost-first, skipping
/// braces inside double-quoted runs (string literals, or quoted fragments
/// in surrounding prose). An opener that never closes (truncated
/// output) simply contributes no span; balanced spans nested inside it are
/// still found. Unbalanced closers are ignored rather than underflowing.
fn balanced_spans(text: &str) -> Vec<&str> {
    let mut spans: Vec<(usize, usize)> = Vec::new();
    let mut opens: Vec<usize> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => opens.push(i),
            '}' => {
                if let Some(start) = opens.pop() {
                    spans.push((start, i));
                }
            }
            _ => {}
        }
    }

    // Outermost spans first: earliest start, then widest.
    spans.sort_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)));
    spans.into_iter().map(|(s, e)| &text[s..=e]).collect()
}

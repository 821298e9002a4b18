//! Normalization of stored embedding payloads.

use serde_json::Value;

/// Parse a stored embedding into a numeric vector.
///
/// Accepts a native JSON array of numbers, a string holding a JSON array,
/// or a string holding a list/tuple literal such as `"(0.1, 0.2)"` or
/// `"[np.float32(0.1), 0.2]"`. Returns `None` for anything else, including
/// empty vectors.
pub fn parse_embedding(value: &Value) -> Option<Vec<f32>> {
    let parsed = match value {
        Value::Array(items) => items
            .iter()
            .map(|item| item.as_f64().map(|x| x as f32))
            .collect::<Option<Vec<f32>>>(),
        Value::String(text) => parse_embedding_text(text),
        _ => None,
    }?;

    (!parsed.is_empty()).then_some(parsed)
}

fn parse_embedding_text(text: &str) -> Option<Vec<f32>> {
    let text = text.trim();
    if let Ok(parsed) = serde_json::from_str::<Vec<f32>>(text) {
        return Some(parsed);
    }
    parse_literal(text)
}

/// Parse a bracketed, comma-separated literal.
fn parse_literal(text: &str) -> Option<Vec<f32>> {
    let inner = text
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .or_else(|| text.strip_prefix('(').and_then(|rest| rest.strip_suffix(')')))?;

    let mut values = Vec::new();
    let mut parts = inner.split(',').map(str::trim).peekable();
    while let Some(part) = parts.next() {
        // A trailing comma is valid in a one-element tuple.
        if part.is_empty() && parts.peek().is_none() {
            break;
        }
        values.push(parse_number(part)?);
    }
    Some(values)
}

/// Parse a number, unwrapping a `name(number)` wrapper if present.
fn parse_number(token: &str) -> Option<f32> {
    let token = match (token.find('('), token.strip_suffix(')')) {
        (Some(open), Some(head)) => &head[open + 1..],
        _ => token,
    };
    token.trim().parse().ok()
}

//! Response parsing with repair for truncated structured lists.
//!
//! Long extractions sometimes hit the service's output limit and come back cut
//! off mid-list. Before giving up we cut the text back to the last complete
//! object and close whatever lists/objects are still open.

use serde_json::Value;

use crate::retry::ServiceError;

/// Status token attached to unparseable responses (classified as fatal).
pub const MALFORMED_RESPONSE: &str = "MALFORMED_RESPONSE";

/// Parse a service response body, repairing a truncated list if needed.
pub fn parse_structured_response(raw: &str) -> Result<Value, ServiceError> {
    let text = strip_code_fence(raw.trim());
    match serde_json::from_str::<Value>(text) {
        Ok(value) => Ok(value),
        Err(e) => match repair_truncated(text) {
            Some(value) => {
                tracing::warn!(len = text.len(), "repaired truncated response");
                Ok(value)
            }
            None => Err(ServiceError::message(format!("malformed response: {}", e))
                .with_code(MALFORMED_RESPONSE)),
        },
    }
}

/// Close a truncated JSON document at its last complete object.
/// Returns `None` when no cut point yields valid JSON.
pub fn repair_truncated(text: &str) -> Option<Value> {
    let text = text.trim();
    if !text.starts_with('[') && !text.starts_with('{') {
        return None;
    }
    cut_points(text)
        .into_iter()
        .rev()
        .take(MAX_REPAIR_CANDIDATES)
        .find_map(|(cut, closers)| {
            serde_json::from_str::<Value>(&format!("{}{}", &text[..cut], closers)).ok()
        })
}

/// Cut candidates tried before giving up. Each one is a full parse.
const MAX_REPAIR_CANDIDATES: usize = 8;

/// Single pass over `text` collecting, for every `}` outside a string that
/// leaves something open, the cut offset and the closers needed there
/// (innermost first). Stops at the first mismatched bracket.
fn cut_points(text: &str) -> Vec<(usize, String)> {
    let mut cuts = Vec::new();
    let mut stack = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                if stack.pop() != Some(c) {
                    break;
                }
                if c == '}' && !stack.is_empty() {
                    cuts.push((i + 1, stack.iter().rev().collect()));
                }
            }
            _ => {}
        }
    }
    cuts
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

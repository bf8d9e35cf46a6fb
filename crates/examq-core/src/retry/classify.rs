//! Classify completion-service failures into retry policy error kinds.

use crate::retry::error::ServiceError;
use crate::retry::policy::ErrorKind;

/// Status token the service reports when a quota is used up.
pub const RESOURCE_EXHAUSTED: &str = "RESOURCE_EXHAUSTED";

const RATE_LIMIT_MARKERS: &[&str] = &["429", "quota", "exhausted"];

const CONNECTIVITY_MARKERS: &[&str] = &[
    "network",
    "fetch",
    "connection reset",
    "connection refused",
    "econnreset",
];

const RPC_MARKERS: &[&str] = &["rpc failed", "internal error encountered", "internal rpc error"];

/// Classify a numeric status code. `None` means the code alone says nothing.
pub fn classify_status(code: u16) -> Option<ErrorKind> {
    match code {
        429 => Some(ErrorKind::RateLimited),
        500 | 503 => Some(ErrorKind::Transient),
        _ => None,
    }
}

/// Classify by message text (case-insensitive substring match).
pub fn classify_message(message: &str) -> Option<ErrorKind> {
    let lower = message.to_lowercase();
    if RATE_LIMIT_MARKERS.iter().any(|m| lower.contains(m)) {
        return Some(ErrorKind::RateLimited);
    }
    if CONNECTIVITY_MARKERS.iter().any(|m| lower.contains(m))
        || RPC_MARKERS.iter().any(|m| lower.contains(m))
    {
        return Some(ErrorKind::Transient);
    }
    None
}

/// Classify a service error. Rate limiting wins over transient signals so a
/// 429 wrapped in a network-sounding message still gets the long wait.
pub fn classify(e: &ServiceError) -> ErrorKind {
    let by_status = e.status.and_then(classify_status);
    let exhausted_token = e
        .code
        .as_deref()
        .is_some_and(|c| c.eq_ignore_ascii_case(RESOURCE_EXHAUSTED));
    let by_message = classify_message(&e.message);

    if by_status == Some(ErrorKind::RateLimited)
        || exhausted_token
        || by_message == Some(ErrorKind::RateLimited)
    {
        return ErrorKind::RateLimited;
    }
    if by_status == Some(ErrorKind::Transient) || by_message == Some(ErrorKind::Transient) {
        return ErrorKind::Transient;
    }
    ErrorKind::Fatal
}

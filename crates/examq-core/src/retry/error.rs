//! Error returned by a single call against the completion service.

use std::fmt;

/// Failure from one attempt against the external completion service.
///
/// Carries whatever the service reported: an HTTP-style status, a status token
/// such as `RESOURCE_EXHAUSTED`, and the raw message. The classifier inspects
/// all three, so callers should fill in as much as they know.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceError {
    /// Numeric status or error code (e.g. 429, 500).
    pub status: Option<u16>,
    /// Status token reported alongside the code (e.g. `RESOURCE_EXHAUSTED`).
    pub code: Option<String>,
    /// Human-readable message as returned by the service or transport.
    pub message: String,
}

impl ServiceError {
    /// Error with only a message (transport failures, parse failures).
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            status: None,
            code: None,
            message: message.into(),
        }
    }

    /// Error with a numeric status and message.
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            code: None,
            message: message.into(),
        }
    }

    /// Attach a status token.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.status, self.code.as_deref()) {
            (Some(status), Some(code)) => write!(f, "{} {}: {}", status, code, self.message),
            (Some(status), None) => write!(f, "status {}: {}", status, self.message),
            (None, Some(code)) => write!(f, "{}: {}", code, self.message),
            (None, None) => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for ServiceError {}

//! External completion client boundary.
//!
//! The scheduler never talks to the service directly; callers wrap a
//! [`CompletionClient`] call in the work they submit. A client returns either
//! a fully valid structured response or a classifiable [`ServiceError`].

mod repair;
mod scripted;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::retry::ServiceError;

pub use repair::{parse_structured_response, repair_truncated};
pub use scripted::{ScriptedClient, ScriptedOutcome};

/// Structured request: free-form payload plus the expected response shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub payload: serde_json::Value,
    /// JSON schema (or schema-like description) the response must follow.
    #[serde(default)]
    pub response_schema: serde_json::Value,
}

impl CompletionRequest {
    pub fn new(payload: serde_json::Value) -> Self {
        Self {
            payload,
            response_schema: serde_json::Value::Null,
        }
    }
}

/// Structured response from the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub body: serde_json::Value,
}

#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, ServiceError>;
}

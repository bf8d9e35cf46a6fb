//! Deterministic client that replays a fixed list of outcomes.
//!
//! Used by the `simulate` command and by tests in place of the real service.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{CompletionClient, CompletionRequest, CompletionResponse};
use crate::retry::{ServiceError, RESOURCE_EXHAUSTED};

/// One scripted reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScriptedOutcome {
    #[serde(rename = "ok")]
    Ok,
    /// Status 429.
    #[serde(rename = "429")]
    RateLimited,
    /// `RESOURCE_EXHAUSTED` status token without a numeric code.
    #[serde(rename = "quota")]
    Quota,
    /// Status 500.
    #[serde(rename = "500")]
    ServerError,
    /// Status 503.
    #[serde(rename = "503")]
    Unavailable,
    /// Transport failure with no status.
    #[serde(rename = "network")]
    Network,
    /// Request rejected as invalid (status 400).
    #[serde(rename = "fatal")]
    Fatal,
}

impl ScriptedOutcome {
    pub fn to_result(self, request: &CompletionRequest) -> Result<CompletionResponse, ServiceError> {
        match self {
            ScriptedOutcome::Ok => Ok(CompletionResponse {
                body: serde_json::json!({ "echo": request.payload }),
            }),
            ScriptedOutcome::RateLimited => Err(ServiceError::status(429, "Too Many Requests")),
            ScriptedOutcome::Quota => {
                Err(ServiceError::message("per-minute request limit reached")
                    .with_code(RESOURCE_EXHAUSTED))
            }
            ScriptedOutcome::ServerError => Err(ServiceError::status(500, "Internal Server Error")),
            ScriptedOutcome::Unavailable => Err(ServiceError::status(503, "Service Unavailable")),
            ScriptedOutcome::Network => Err(ServiceError::message("TypeError: Failed to fetch")),
            ScriptedOutcome::Fatal => Err(ServiceError::status(
                400,
                "Invalid JSON payload: response schema rejected",
            )),
        }
    }
}

/// Replays outcomes in order; once the script runs out, the last outcome
/// repeats (an empty script always succeeds).
#[derive(Debug)]
pub struct ScriptedClient {
    script: Mutex<VecDeque<ScriptedOutcome>>,
    last: Mutex<ScriptedOutcome>,
    calls: Mutex<u32>,
}

impl ScriptedClient {
    pub fn new(script: impl IntoIterator<Item = ScriptedOutcome>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            last: Mutex::new(ScriptedOutcome::Ok),
            calls: Mutex::new(0),
        }
    }

    /// Number of `complete` calls so far.
    pub fn calls(&self) -> u32 {
        *self.calls.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn next_outcome(&self) -> ScriptedOutcome {
        let mut script = self.script.lock().unwrap_or_else(|p| p.into_inner());
        let mut last = self.last.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(next) = script.pop_front() {
            *last = next;
        }
        *last
    }
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, ServiceError> {
        *self.calls.lock().unwrap_or_else(|p| p.into_inner()) += 1;
        self.next_outcome().to_result(request)
    }
}

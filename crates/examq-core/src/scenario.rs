//! Scripted scenarios: run a list of tasks with canned service outcomes
//! through a real scheduler and record dispatch and settlement order.
//!
//! Scenario files are TOML:
//!
//! ```toml
//! concurrency = 1
//!
//! [[task]]
//! name = "page-1"
//! outcomes = ["429", "ok"]
//!
//! [[task]]
//! name = "fix-question-3"
//! priority = "high"
//! submit_at_ms = 10
//! outcomes = ["ok"]
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;

use crate::client::{CompletionClient, CompletionRequest, ScriptedClient, ScriptedOutcome};
use crate::scheduler::{Priority, Scheduler};

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    /// Overrides the configured concurrency limit when set.
    #[serde(default)]
    pub concurrency: Option<usize>,
    #[serde(default, rename = "task")]
    pub tasks: Vec<ScenarioTask>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioTask {
    pub name: String,
    #[serde(default)]
    pub priority: Priority,
    /// Offset from scenario start at which the task is submitted.
    #[serde(default)]
    pub submit_at_ms: u64,
    /// Replies for successive attempts; the last one repeats.
    #[serde(default)]
    pub outcomes: Vec<ScriptedOutcome>,
}

impl Scenario {
    pub fn from_toml(data: &str) -> Result<Self> {
        Ok(toml::from_str(data)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading scenario {}", path.display()))?;
        Self::from_toml(&data).with_context(|| format!("parsing scenario {}", path.display()))
    }
}

/// How one task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    pub name: String,
    pub ok: bool,
    /// Calls made against the scripted service.
    pub attempts: u32,
    /// Error text for failures, empty on success.
    pub detail: String,
    /// Time since scenario start.
    pub at: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct ScenarioReport {
    /// Task names in the order their first attempt started.
    pub started: Vec<String>,
    /// Settlements in completion order.
    pub settled: Vec<Settlement>,
}

/// Submit every task at its offset and wait for all of them to settle.
pub async fn run_scenario(scenario: &Scenario, scheduler: &Scheduler) -> Result<ScenarioReport> {
    let mut tasks = scenario.tasks.clone();
    tasks.sort_by_key(|t| t.submit_at_ms);

    let start = Instant::now();
    let started: Arc<Mutex<Vec<String>>> = Arc::default();
    let mut join_set = JoinSet::new();

    for task in tasks {
        tokio::time::sleep_until(start + Duration::from_millis(task.submit_at_ms)).await;

        let client = Arc::new(ScriptedClient::new(task.outcomes.iter().copied()));
        let request = CompletionRequest::new(serde_json::json!({ "task": task.name }));
        let work = {
            let client = Arc::clone(&client);
            let started = Arc::clone(&started);
            let name = task.name.clone();
            move || {
                let client = Arc::clone(&client);
                let started = Arc::clone(&started);
                let request = request.clone();
                let name = name.clone();
                async move {
                    if client.calls() == 0 {
                        started.lock().unwrap_or_else(|p| p.into_inner()).push(name);
                    }
                    client.complete(&request).await
                }
            }
        };

        let handle = scheduler.submit(task.priority, work);
        tracing::info!(task = %task.name, task_id = handle.id(), priority = ?task.priority, "scenario task submitted");
        let name = task.name;
        join_set.spawn(async move {
            let result = handle.await;
            Settlement {
                name,
                ok: result.is_ok(),
                attempts: client.calls(),
                detail: result.err().map(|e| e.to_string()).unwrap_or_default(),
                at: start.elapsed(),
            }
        });
    }

    let mut settled = Vec::new();
    while let Some(res) = join_set.join_next().await {
        settled.push(res.map_err(|e| anyhow::anyhow!("scenario task join: {}", e))?);
    }

    let started = started.lock().unwrap_or_else(|p| p.into_inner()).clone();
    Ok(ScenarioReport { started, settled })
}

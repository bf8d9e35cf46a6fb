//! Work factory that records when each task's attempts start.

use std::sync::{Arc, Mutex};

use examq_core::client::{CompletionClient, CompletionRequest, ScriptedClient, ScriptedOutcome};
use examq_core::retry::ServiceError;
use serde_json::Value;
use tokio::time::Instant;

/// One attempt start: task name and offset from the recorder's creation.
pub type AttemptLog = Arc<Mutex<Vec<(String, u128)>>>;

#[derive(Clone)]
pub struct Recorder {
    pub log: AttemptLog,
    epoch: Instant,
}

impl Recorder {
    pub fn new() -> Self {
        Self {
            log: Arc::default(),
            epoch: Instant::now(),
        }
    }

    /// Work calling a scripted client and returning the response body.
    pub fn work(
        &self,
        name: &str,
        script: Vec<ScriptedOutcome>,
    ) -> (
        Arc<ScriptedClient>,
        impl FnMut() -> std::pin::Pin<
            Box<dyn std::future::Future<Output = Result<Value, ServiceError>> + Send>,
        > + Send
            + 'static,
    ) {
        let client = Arc::new(ScriptedClient::new(script));
        let request = CompletionRequest::new(serde_json::json!({ "page": name }));
        let log = Arc::clone(&self.log);
        let epoch = self.epoch;
        let name = name.to_string();
        let work_client = Arc::clone(&client);
        let work = move || -> std::pin::Pin<
            Box<dyn std::future::Future<Output = Result<Value, ServiceError>> + Send>,
        > {
            let client = Arc::clone(&work_client);
            let request = request.clone();
            let log = Arc::clone(&log);
            let name = name.clone();
            Box::pin(async move {
                log.lock().unwrap().push((name, epoch.elapsed().as_millis()));
                client.complete(&request).await.map(|r| r.body)
            })
        };
        (client, work)
    }

    /// Names in the order attempts started (a task appears once per attempt).
    pub fn attempts(&self) -> Vec<String> {
        self.log.lock().unwrap().iter().map(|(n, _)| n.clone()).collect()
    }

    /// Start offsets (ms) of every attempt of `name`.
    pub fn starts_of(&self, name: &str) -> Vec<u128> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, t)| *t)
            .collect()
    }
}

//! Retry loop: run an async closure until success or the policy says stop.

use std::future::Future;
use std::time::Duration;

use super::classify;
use super::error::ServiceError;
use super::policy::{ErrorKind, RetryDecision, RetryPolicy};

/// One backoff wait inserted between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffWait {
    /// Attempt (1-based) whose failure caused this wait.
    pub after_attempt: u32,
    pub kind: ErrorKind,
    pub delay: Duration,
}

/// Progress notifications from the attempt loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryEvent {
    /// Attempt `n` (1-based) is about to invoke the work.
    Attempt(u32),
    /// The loop is about to sleep before the next attempt.
    Backoff(BackoffWait),
}

/// What happened across all attempts of one unit of work.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryReport {
    pub attempts: u32,
    pub waits: Vec<BackoffWait>,
}

impl RetryReport {
    pub fn total_backoff(&self) -> Duration {
        self.waits.iter().map(|w| w.delay).sum()
    }
}

/// Final result of the loop plus its report. `kind` is the classification of
/// the last error when `result` is `Err`.
#[derive(Debug)]
pub struct RetryOutcome<T> {
    pub result: Result<T, ServiceError>,
    pub kind: Option<ErrorKind>,
    pub report: RetryReport,
}

/// Runs `work` until it succeeds or the policy says to stop, reporting each
/// attempt and backoff to `observer`. On retryable failure, sleeps for the
/// backoff duration then tries again.
pub async fn execute<T, F, Fut, O>(policy: &RetryPolicy, mut work: F, mut observer: O) -> RetryOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ServiceError>>,
    O: FnMut(RetryEvent),
{
    let mut report = RetryReport::default();
    let mut attempt = 1u32;
    loop {
        observer(RetryEvent::Attempt(attempt));
        report.attempts = attempt;
        match work().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(attempts = attempt, "call succeeded after retry");
                }
                return RetryOutcome {
                    result: Ok(value),
                    kind: None,
                    report,
                };
            }
            Err(e) => {
                let kind = classify::classify(&e);
                match policy.decide(attempt, kind) {
                    RetryDecision::NoRetry => {
                        if kind.is_retryable() {
                            tracing::warn!(error = %e, attempts = attempt, %kind, "retries exhausted");
                        } else {
                            tracing::warn!(error = %e, attempts = attempt, "fatal error, not retrying");
                        }
                        return RetryOutcome {
                            result: Err(e),
                            kind: Some(kind),
                            report,
                        };
                    }
                    RetryDecision::RetryAfter(delay) => {
                        let wait = BackoffWait {
                            after_attempt: attempt,
                            kind,
                            delay,
                        };
                        tracing::debug!(
                            error = %e,
                            attempt,
                            %kind,
                            delay_ms = delay.as_millis() as u64,
                            "call failed, backing off"
                        );
                        observer(RetryEvent::Backoff(wait));
                        report.waits.push(wait);
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                }
            }
        }
    }
}

/// Runs `work` with `policy` and returns the value or the last error.
pub async fn run_with_retry<T, F, Fut>(policy: &RetryPolicy, work: F) -> Result<T, ServiceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ServiceError>>,
{
    execute(policy, work, |_| {}).await.result
}

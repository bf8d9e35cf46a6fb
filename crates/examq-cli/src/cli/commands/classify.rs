//! `examq classify` – show how a service error would be retried.

use examq_core::config::ExamqConfig;
use examq_core::retry::{classify, ErrorKind, RetryPolicy, ServiceError};

pub fn run_classify(cfg: &ExamqConfig, message: &str, status: Option<u16>, code: Option<&str>) {
    let err = build_error(message, status, code);
    let kind = classify(&err);
    println!("{}", kind);
    println!("  {}", describe_wait(kind, &cfg.retry_policy()));
}

fn build_error(message: &str, status: Option<u16>, code: Option<&str>) -> ServiceError {
    let mut err = match status {
        Some(s) => ServiceError::status(s, message),
        None => ServiceError::message(message),
    };
    if let Some(c) = code {
        err = err.with_code(c);
    }
    err
}

fn describe_wait(kind: ErrorKind, policy: &RetryPolicy) -> String {
    match kind {
        ErrorKind::RateLimited => format!(
            "retried up to {} times, waiting {}-{} ms each time",
            policy.max_attempts.saturating_sub(1),
            policy.rate_limit_min.as_millis(),
            policy.rate_limit_max.as_millis()
        ),
        ErrorKind::Transient => {
            let waits: Vec<String> = (1..policy.max_attempts)
                .map(|a| policy.transient_delay(a).as_millis().to_string())
                .collect();
            format!("retried up to {} times, waits (ms): {}", waits.len(), waits.join(", "))
        }
        ErrorKind::Fatal => "not retried".to_string(),
    }
}

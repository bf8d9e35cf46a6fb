//! Retry and backoff policy.
//!
//! This module encapsulates error classification (rate limiting, transient
//! network/server failures, fatal errors) and the backoff decisions so the
//! scheduler and direct callers share one policy.

mod classify;
mod error;
mod policy;
mod run;

pub use classify::{classify, classify_message, classify_status, RESOURCE_EXHAUSTED};
pub use error::ServiceError;
pub use policy::{ErrorKind, RetryDecision, RetryPolicy};
pub use run::{execute, run_with_retry, BackoffWait, RetryEvent, RetryOutcome, RetryReport};

//! Task scheduler for calls against a rate-limited completion service.
//!
//! One shared queue with two priority classes feeds a concurrency gate.
//! Every admitted task runs its own retry loop (see [`crate::retry`]) and
//! settles its [`TaskHandle`] exactly once.

mod dispatch;
mod error;
mod gate;
mod guard;
mod handle;
mod queue;
mod stats;
mod task;

pub use dispatch::Scheduler;
pub use error::{QueueError, TaskError};
pub use gate::ConcurrencyGate;
pub use handle::{TaskHandle, TaskResult};
pub use queue::PendingQueue;
pub use stats::SchedulerStats;
pub use task::{Priority, TaskId, TaskState};

#[cfg(test)]
mod tests;

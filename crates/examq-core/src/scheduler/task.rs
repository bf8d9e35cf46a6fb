//! Types describing a submitted task.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Task identifier, unique within one scheduler and never reused.
pub type TaskId = u64;

/// Dispatch class. `High` tasks jump ahead of waiting `Normal` tasks but
/// never preempt running ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[default]
    Normal,
    High,
}

impl Priority {
    pub fn is_high(self) -> bool {
        matches!(self, Priority::High)
    }
}

/// Lifecycle of a task.
///
/// `Retrying(n)` means attempt `n` failed with a retryable error and the task
/// is sleeping before attempt `n + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Running,
    Retrying(u32),
    Succeeded,
    Failed,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Succeeded | TaskState::Failed)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskState::Pending => f.write_str("pending"),
            TaskState::Running => f.write_str("running"),
            TaskState::Retrying(n) => write!(f, "retrying (after attempt {})", n),
            TaskState::Succeeded => f.write_str("succeeded"),
            TaskState::Failed => f.write_str("failed"),
        }
    }
}

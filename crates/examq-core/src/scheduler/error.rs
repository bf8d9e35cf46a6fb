//! Errors surfaced by the scheduler and delivered on task handles.

use crate::retry::{ErrorKind, ServiceError};

/// Scheduler bookkeeping failures. These indicate a bug, not a service problem.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("queue invariant violated: {0}")]
    Internal(String),
    #[error("task {0} already settled")]
    AlreadySettled(u64),
}

/// Terminal failure delivered on a task handle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskError {
    /// The work failed with a fatal error or ran out of attempts.
    #[error("{kind} failure after {attempts} attempt(s): {source}")]
    Service {
        kind: ErrorKind,
        attempts: u32,
        #[source]
        source: ServiceError,
    },
    /// The task was lost inside the scheduler (e.g. its work panicked).
    #[error(transparent)]
    QueueInternal(#[from] QueueError),
}

impl TaskError {
    /// Classification of the last service error, if this was a service failure.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            TaskError::Service { kind, .. } => Some(*kind),
            TaskError::QueueInternal(_) => None,
        }
    }

    pub fn service_error(&self) -> Option<&ServiceError> {
        match self {
            TaskError::Service { source, .. } => Some(source),
            TaskError::QueueInternal(_) => None,
        }
    }
}

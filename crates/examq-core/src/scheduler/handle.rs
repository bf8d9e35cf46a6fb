//! One-shot result handle for a submitted task.
//!
//! The scheduler keeps a [`Settler`]; the submitter keeps a [`TaskHandle`].
//! A settler delivers exactly once: a second `settle` returns
//! `QueueError::AlreadySettled`, and a settler dropped without settling
//! delivers `QueueInternal` so no submitter waits forever.
//!
//! A handle can be awaited, waited on from synchronous code, or turned into a
//! callback with [`TaskHandle::on_settled`].

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};

use tokio::sync::{oneshot, watch};

use super::error::{QueueError, TaskError};
use super::task::{Priority, TaskId, TaskState};

/// Outcome delivered on a handle.
pub type TaskResult<T> = Result<T, TaskError>;

type Callback<T> = Box<dyn FnOnce(TaskResult<T>) + Send + 'static>;

enum Slot<T> {
    Waiting,
    Listening(Callback<T>),
    Settled,
}

struct Shared<T> {
    slot: Mutex<Slot<T>>,
}

impl<T> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, Slot<T>> {
        self.slot.lock().unwrap_or_else(|p| p.into_inner())
    }
}

/// Create a connected settler/handle pair.
pub(crate) fn channel<T: Send + 'static>(
    id: TaskId,
    priority: Priority,
) -> (Settler<T>, TaskHandle<T>) {
    let (tx, rx) = oneshot::channel();
    let (state_tx, state_rx) = watch::channel(TaskState::Pending);
    let shared = Arc::new(Shared {
        slot: Mutex::new(Slot::Waiting),
    });
    let settler = Settler {
        id,
        tx: Some(tx),
        shared: Arc::clone(&shared),
        state: StateReporter(Arc::new(state_tx)),
    };
    let handle = TaskHandle {
        id,
        priority,
        rx,
        shared,
        state: state_rx,
    };
    (settler, handle)
}

/// Publishes lifecycle changes to the task's handle. Cloned into the queue
/// entry so dispatch can mark the task running before its future is polled.
#[derive(Clone)]
pub(crate) struct StateReporter(Arc<watch::Sender<TaskState>>);

impl StateReporter {
    pub(crate) fn set(&self, state: TaskState) {
        self.0.send_replace(state);
    }
}

/// Scheduler-side end: reports state changes and settles the result.
pub(crate) struct Settler<T: Send + 'static> {
    id: TaskId,
    tx: Option<oneshot::Sender<TaskResult<T>>>,
    shared: Arc<Shared<T>>,
    state: StateReporter,
}

impl<T: Send + 'static> Settler<T> {
    pub(crate) fn set_state(&self, state: TaskState) {
        self.state.set(state);
    }

    pub(crate) fn reporter(&self) -> StateReporter {
        self.state.clone()
    }

    /// Deliver the outcome. Errors if this settler already delivered one.
    pub(crate) fn settle(&mut self, result: TaskResult<T>) -> Result<(), QueueError> {
        let tx = self.tx.take().ok_or(QueueError::AlreadySettled(self.id))?;
        self.set_state(if result.is_ok() {
            TaskState::Succeeded
        } else {
            TaskState::Failed
        });

        let mut slot = self.shared.lock();
        match std::mem::replace(&mut *slot, Slot::Settled) {
            Slot::Listening(callback) => {
                drop(slot);
                callback(result);
            }
            Slot::Waiting | Slot::Settled => {
                // Receiver may be gone (handle dropped); nothing to deliver to.
                let _ = tx.send(result);
            }
        }
        Ok(())
    }
}

impl<T: Send + 'static> Drop for Settler<T> {
    fn drop(&mut self) {
        if self.tx.is_some() {
            tracing::error!(task_id = self.id, "task dropped before settlement");
            let _ = self.settle(Err(TaskError::QueueInternal(QueueError::Internal(format!(
                "task {} dropped before settlement",
                self.id
            )))));
        }
    }
}

/// Submitter-side end of a task.
///
/// Implements `Future<Output = TaskResult<T>>`.
pub struct TaskHandle<T> {
    id: TaskId,
    priority: Priority,
    rx: oneshot::Receiver<TaskResult<T>>,
    shared: Arc<Shared<T>>,
    state: watch::Receiver<TaskState>,
}

impl<T: Send + 'static> TaskHandle<T> {
    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Current lifecycle state of the task.
    pub fn state(&self) -> TaskState {
        *self.state.borrow()
    }

    /// Block the current thread until the task settles.
    ///
    /// Must not be called from inside an async runtime worker thread.
    pub fn wait_blocking(self) -> TaskResult<T> {
        let id = self.id;
        self.rx.blocking_recv().unwrap_or_else(|_| Err(lost(id)))
    }

    /// Register `callback` to run with the outcome. If the task already
    /// settled, the callback runs immediately on the calling thread;
    /// otherwise it runs on the thread that settles the task.
    pub fn on_settled<F>(self, callback: F)
    where
        F: FnOnce(TaskResult<T>) + Send + 'static,
    {
        let TaskHandle {
            id, mut rx, shared, ..
        } = self;
        let mut slot = shared.lock();
        if matches!(*slot, Slot::Waiting) {
            *slot = Slot::Listening(Box::new(callback));
            return;
        }
        drop(slot);
        let result = rx.try_recv().unwrap_or_else(|_| Err(lost(id)));
        callback(result);
    }
}

impl<T> Future for TaskHandle<T> {
    type Output = TaskResult<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let id = self.id;
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|r| r.unwrap_or_else(|_| Err(lost(id))))
    }
}

impl<T> std::fmt::Debug for TaskHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("state", &*self.state.borrow())
            .finish()
    }
}

fn lost(id: TaskId) -> TaskError {
    TaskError::QueueInternal(QueueError::Internal(format!(
        "result channel for task {} closed without a value",
        id
    )))
}

//! The scheduler: priority queue in front of a concurrency gate.
//!
//! `submit` enqueues and calls `dispatch`; `dispatch` moves tasks from the
//! queue into spawned tokio tasks while the gate has room. Each finished task
//! frees its slot through a [`SlotGuard`], settles its handle and calls
//! `dispatch` again, which keeps the gate saturated.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::runtime::Handle;
use tokio::sync::Notify;

use crate::retry::{self, ErrorKind, RetryEvent, RetryPolicy, ServiceError};

use super::error::TaskError;
use super::gate::ConcurrencyGate;
use super::guard::SlotGuard;
use super::handle::{self, StateReporter, TaskHandle};
use super::queue::PendingQueue;
use super::stats::SchedulerStats;
use super::task::{Priority, TaskId, TaskState};

/// How a task ended, for the scheduler's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Verdict {
    Succeeded,
    Failed,
}

/// Produced by a finished job: the verdict plus a closure that settles the
/// handle. Settlement is deferred so the slot is freed first.
pub(super) struct Completion {
    pub(super) verdict: Verdict,
    pub(super) settle: Box<dyn FnOnce() + Send>,
}

type JobFuture = Pin<Box<dyn Future<Output = Completion> + Send>>;
type Job = Box<dyn FnOnce() -> JobFuture + Send>;

struct QueuedTask {
    id: TaskId,
    state: StateReporter,
    job: Job,
}

pub(super) struct QueueState {
    queue: PendingQueue<QueuedTask>,
    pub(super) gate: ConcurrencyGate,
    pub(super) succeeded: u64,
    pub(super) failed: u64,
}

impl QueueState {
    pub(super) fn record(&mut self, verdict: Verdict) {
        match verdict {
            Verdict::Succeeded => self.succeeded += 1,
            Verdict::Failed => self.failed += 1,
        }
    }

    fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            limit: self.gate.limit(),
            running: self.gate.running(),
            pending: self.queue.len(),
            pending_high: self.queue.high_len(),
            succeeded: self.succeeded,
            failed: self.failed,
        }
    }
}

pub(super) struct Inner {
    state: Mutex<QueueState>,
    policy: RetryPolicy,
    next_id: AtomicU64,
    idle: Notify,
    runtime: Handle,
}

impl Inner {
    /// Enter the critical section guarding queue and gate.
    pub(super) fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Wake `idle()` waiters if nothing is queued or running.
    pub(super) fn notify_if_idle(&self) {
        if self.lock().stats().is_idle() {
            self.idle.notify_waiters();
        }
    }
}

/// Admit queued tasks while the gate has free slots.
pub(super) fn dispatch(inner: &Arc<Inner>) {
    let ready: Vec<QueuedTask> = {
        let mut state = inner.lock();
        let mut ready = Vec::new();
        while !state.queue.is_empty() && state.gate.try_acquire() {
            if let Some(task) = state.queue.pop() {
                ready.push(task);
            }
        }
        ready
    };

    for task in ready {
        tracing::debug!(task_id = task.id, "task dispatched");
        task.state.set(TaskState::Running);
        let guard = SlotGuard::new(Arc::clone(inner), task.id);
        let job = task.job;
        inner.runtime.spawn(async move {
            let completion = job().await;
            guard.finish(completion);
        });
    }
}

/// Shared task scheduler. Cloning yields another handle to the same queue.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    /// Create a scheduler running at most `limit` tasks at once (clamped to
    /// at least 1), spawning work on the current tokio runtime.
    ///
    /// Panics if called outside a tokio runtime; use
    /// [`with_runtime`](Self::with_runtime) there.
    pub fn new(limit: usize, policy: RetryPolicy) -> Self {
        Self::with_runtime(limit, policy, Handle::current())
    }

    pub fn with_runtime(limit: usize, policy: RetryPolicy, runtime: Handle) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(QueueState {
                    queue: PendingQueue::new(),
                    gate: ConcurrencyGate::new(limit),
                    succeeded: 0,
                    failed: 0,
                }),
                policy,
                next_id: AtomicU64::new(1),
                idle: Notify::new(),
                runtime,
            }),
        }
    }

    /// Default retry policy applied by [`submit`](Self::submit).
    pub fn policy(&self) -> &RetryPolicy {
        &self.inner.policy
    }

    pub fn limit(&self) -> usize {
        self.inner.lock().gate.limit()
    }

    /// Queue `work` with the scheduler's default retry policy.
    /// Returns immediately; the task runs when a slot frees up.
    pub fn submit<T, F, Fut>(&self, priority: Priority, work: F) -> TaskHandle<T>
    where
        T: Send + 'static,
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, ServiceError>> + Send + 'static,
    {
        self.submit_with(priority, self.inner.policy, work)
    }

    /// Queue `work` with an explicit retry policy for this task only.
    pub fn submit_with<T, F, Fut>(
        &self,
        priority: Priority,
        policy: RetryPolicy,
        work: F,
    ) -> TaskHandle<T>
    where
        T: Send + 'static,
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, ServiceError>> + Send + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (settler, handle) = handle::channel::<T>(id, priority);
        let state = settler.reporter();

        let job: Job = Box::new(move || -> JobFuture {
            Box::pin(async move {
                let outcome = retry::execute(&policy, work, |event| match event {
                    RetryEvent::Attempt(_) => settler.set_state(TaskState::Running),
                    RetryEvent::Backoff(wait) => {
                        settler.set_state(TaskState::Retrying(wait.after_attempt))
                    }
                })
                .await;

                let attempts = outcome.report.attempts;
                let (verdict, result) = match outcome.result {
                    Ok(value) => (Verdict::Succeeded, Ok(value)),
                    Err(source) => {
                        let kind = outcome.kind.unwrap_or(ErrorKind::Fatal);
                        tracing::warn!(task_id = id, attempts, %kind, error = %source, "task failed");
                        (
                            Verdict::Failed,
                            Err(TaskError::Service {
                                kind,
                                attempts,
                                source,
                            }),
                        )
                    }
                };
                tracing::debug!(
                    task_id = id,
                    attempts,
                    backoff_ms = outcome.report.total_backoff().as_millis() as u64,
                    "task finished"
                );

                Completion {
                    verdict,
                    settle: Box::new(move || {
                        let mut settler = settler;
                        if let Err(e) = settler.settle(result) {
                            tracing::error!(task_id = id, error = %e, "settlement failed");
                        }
                    }),
                }
            })
        });

        self.inner.lock().queue.push(priority, QueuedTask { id, state, job });
        tracing::debug!(task_id = id, ?priority, "task submitted");
        dispatch(&self.inner);
        handle
    }

    /// Snapshot of queue and gate counters.
    pub fn stats(&self) -> SchedulerStats {
        self.inner.lock().stats()
    }

    /// Wait until nothing is queued or running.
    pub async fn idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.stats().is_idle() {
                return;
            }
            notified.await;
        }
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("stats", &self.stats())
            .field("policy", &self.inner.policy)
            .finish()
    }
}

//! RAII guard that frees a concurrency slot when a dispatched task ends.

use std::sync::Arc;

use super::dispatch::{dispatch, Completion, Inner, Verdict};
use super::task::TaskId;

/// Frees the slot, records the verdict and refills the gate.
///
/// Normal exit goes through [`finish`](SlotGuard::finish), which releases the
/// slot before settling. The refill always happens in `Drop`, so it still runs
/// when the task's future panics or a settle callback unwinds. A task that
/// never reached `finish` is counted as failed.
pub(super) struct SlotGuard {
    inner: Arc<Inner>,
    task_id: TaskId,
    released: bool,
}

impl SlotGuard {
    pub(super) fn new(inner: Arc<Inner>, task_id: TaskId) -> Self {
        Self {
            inner,
            task_id,
            released: false,
        }
    }

    /// Release the slot and settle the handle; dropping `self` then admits
    /// the next task.
    pub(super) fn finish(mut self, completion: Completion) {
        release(&self.inner, self.task_id, completion.verdict);
        self.released = true;
        (completion.settle)();
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        if !self.released {
            tracing::error!(task_id = self.task_id, "task ended without completing");
            release(&self.inner, self.task_id, Verdict::Failed);
            self.released = true;
        }
        dispatch(&self.inner);
        self.inner.notify_if_idle();
    }
}

fn release(inner: &Inner, task_id: TaskId, verdict: Verdict) {
    let mut state = inner.lock();
    if let Err(e) = state.gate.release() {
        tracing::error!(task_id, error = %e, "slot release failed");
    }
    state.record(verdict);
}

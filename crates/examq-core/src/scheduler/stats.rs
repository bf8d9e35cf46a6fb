//! Point-in-time scheduler counters (CLI-friendly).

/// Snapshot of the scheduler's queue and gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SchedulerStats {
    /// Configured concurrency limit.
    pub limit: usize,
    /// Tasks currently holding a slot (running or backing off).
    pub running: usize,
    /// Tasks waiting in the queue.
    pub pending: usize,
    /// Waiting tasks of the high priority class.
    pub pending_high: usize,
    /// Tasks that settled successfully.
    pub succeeded: u64,
    /// Tasks that settled with an error.
    pub failed: u64,
}

impl SchedulerStats {
    /// No queued work and no running work.
    pub fn is_idle(&self) -> bool {
        self.running == 0 && self.pending == 0
    }

    /// All slots in use.
    pub fn is_saturated(&self) -> bool {
        self.running >= self.limit
    }

    pub fn settled(&self) -> u64 {
        self.succeeded + self.failed
    }
}

//! Concurrency gate: counts running tasks against the configured limit.
//!
//! Lives inside the scheduler's lock, so plain integers are enough; every
//! acquire and release happens in the same critical section as the queue
//! mutation that caused it.

use super::error::QueueError;

#[derive(Debug)]
pub struct ConcurrencyGate {
    limit: usize,
    running: usize,
}

impl ConcurrencyGate {
    /// Create a gate with the given limit (clamped to at least 1).
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            running: 0,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn running(&self) -> usize {
        self.running
    }

    /// Take one slot. Returns false when the gate is saturated.
    pub fn try_acquire(&mut self) -> bool {
        if self.running >= self.limit {
            return false;
        }
        self.running += 1;
        true
    }

    /// Return one slot. Releasing an idle gate is an invariant violation.
    pub fn release(&mut self) -> Result<(), QueueError> {
        if self.running == 0 {
            return Err(QueueError::Internal(
                "released a slot with no running task".to_string(),
            ));
        }
        self.running -= 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_acquire_and_release() {
        let mut gate = ConcurrencyGate::new(2);
        assert!(gate.try_acquire());
        assert!(gate.try_acquire());
        assert!(!gate.try_acquire());
        assert_eq!(gate.running(), 2);
        gate.release().unwrap();
        assert_eq!(gate.running(), 1);
        gate.release().unwrap();
        assert_eq!(gate.running(), 0);
    }

    #[test]
    fn zero_limit_clamped_to_one() {
        let mut gate = ConcurrencyGate::new(0);
        assert_eq!(gate.limit(), 1);
        assert!(gate.try_acquire());
        assert!(!gate.try_acquire());
    }

    #[test]
    fn release_when_idle_is_internal_error() {
        let mut gate = ConcurrencyGate::new(1);
        assert!(matches!(gate.release(), Err(QueueError::Internal(_))));
        assert_eq!(gate.running(), 0);
    }
}

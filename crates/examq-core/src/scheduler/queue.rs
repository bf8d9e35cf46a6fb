//! Pending-task queue with two priority classes.
//!
//! All `High` entries sit ahead of all `Normal` entries; each class is FIFO.
//! A new `High` entry goes right before the first queued `Normal` entry.

use std::collections::VecDeque;

use super::task::Priority;

#[derive(Debug)]
struct Entry<T> {
    priority: Priority,
    item: T,
}

#[derive(Debug)]
pub struct PendingQueue<T> {
    entries: VecDeque<Entry<T>>,
}

impl<T> Default for PendingQueue<T> {
    fn default() -> Self {
        Self {
            entries: VecDeque::new(),
        }
    }
}

impl<T> PendingQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, priority: Priority, item: T) {
        let entry = Entry { priority, item };
        if !priority.is_high() {
            self.entries.push_back(entry);
            return;
        }
        let at = self
            .entries
            .iter()
            .position(|e| !e.priority.is_high())
            .unwrap_or(self.entries.len());
        self.entries.insert(at, entry);
    }

    pub fn pop(&mut self) -> Option<T> {
        self.entries.pop_front().map(|e| e.item)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of queued `High` entries (always a prefix of the queue).
    pub fn high_len(&self) -> usize {
        self.entries
            .iter()
            .take_while(|e| e.priority.is_high())
            .count()
    }
}

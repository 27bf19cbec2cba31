//! Bounded, lock-guarded record of recent probe results.

use std::{
    collections::VecDeque,
    sync::{Mutex, MutexGuard, PoisonError},
};

use nettray_types::probe::ProbeResult;

/// Number of results kept for newly attached observers.
pub const HISTORY_CAPACITY: usize = 30;

/// Ring of the most recent probe results, oldest first.
///
/// The only ways in and out are [`append`](Self::append) and
/// [`snapshot`](Self::snapshot); both take the same lock, so a reader never
/// sees a half-applied append.
#[derive(Debug)]
pub struct HistoryBuffer {
    entries: Mutex<VecDeque<ProbeResult>>,
    capacity: usize,
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryBuffer {
    pub fn new() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn append(&self, result: ProbeResult) {
        let mut entries = self.lock();
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(result);
    }

    pub fn snapshot(&self) -> Vec<ProbeResult> {
        self.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // A panic while holding the lock cannot leave the deque half-updated,
    // so a poisoned lock is still safe to read.
    fn lock(&self) -> MutexGuard<'_, VecDeque<ProbeResult>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

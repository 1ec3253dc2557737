use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Mutex;
use tokio::time::Instant;

use crate::core::command::RuleCommand;

/// A leased rule awaiting automatic removal
#[derive(Debug, Clone)]
pub struct ExpiryEntry {
    pub deadline: Instant,
    pub rule: RuleCommand,
    seq: u64,
}

impl PartialEq for ExpiryEntry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl Eq for ExpiryEntry {}

impl PartialOrd for ExpiryEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ExpiryEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Insertion sequence breaks deadline ties so heap order is stable
        self.deadline
            .cmp(&other.deadline)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

/// Priority queue of pending lease expirations, earliest deadline first.
///
/// Single producer (the command processor) and single consumer (the expiry
/// manager). The separate `peek_deadline`/`pop` steps are only sound under
/// that discipline: nothing else removes or reorders entries, so between the
/// two calls the earliest entry can only stay the same or become staler.
/// A second consumer would require an atomic conditional pop instead.
pub struct ExpiryQueue {
    heap: Mutex<BinaryHeap<Reverse<ExpiryEntry>>>,
    seq: AtomicU64,
}

impl ExpiryQueue {
    pub fn new() -> Self {
        Self {
            heap: Mutex::new(BinaryHeap::new()),
            seq: AtomicU64::new(0),
        }
    }

    /// Register a rule for removal at `deadline`
    pub fn push(&self, deadline: Instant, rule: RuleCommand) {
        let seq = self.seq.fetch_add(1, AtomicOrdering::Relaxed);
        let mut heap = self.heap.lock().unwrap();
        heap.push(Reverse(ExpiryEntry {
            deadline,
            rule,
            seq,
        }));
    }

    /// Deadline of the earliest entry, without removing it
    pub fn peek_deadline(&self) -> Option<Instant> {
        let heap = self.heap.lock().unwrap();
        heap.peek().map(|Reverse(entry)| entry.deadline)
    }

    /// Remove and return the earliest entry
    pub fn pop(&self) -> Option<ExpiryEntry> {
        let mut heap = self.heap.lock().unwrap();
        heap.pop().map(|Reverse(entry)| entry)
    }

    pub fn len(&self) -> usize {
        self.heap.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.lock().unwrap().is_empty()
    }
}

impl Default for ExpiryQueue {
    fn default() -> Self {
        Self::new()
    }
}

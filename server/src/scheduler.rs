//! Deferred continuations driven by the authority's simulation clock.
//!
//! Timed sequences (mine arming, countdown steps, respawn delays, expiry) are
//! queued here and handed back to the game loop once their due time passes.
//! Nothing is ever cancelled: each task carries enough context for its handler
//! to re-check whether it is still relevant before acting.

use shared::EntityId;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    ArmMine { mine: EntityId },
    ExpireMine { mine: EntityId },
    DespawnMine { mine: EntityId },
    CountdownStep { epoch: u32, remaining: u8 },
    RespawnKart { kart: EntityId, life: u32 },
    RespawnPickup { pad: u32 },
    RestartMatch { epoch: u32 },
}

#[derive(Debug)]
struct Entry {
    due: f64,
    order: u64,
    task: Task,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    // Reversed so the BinaryHeap pops the earliest entry first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .total_cmp(&self.due)
            .then_with(|| other.order.cmp(&self.order))
    }
}

#[derive(Debug, Default)]
pub struct Scheduler {
    queue: BinaryHeap<Entry>,
    next_order: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, due: f64, task: Task) {
        let order = self.next_order;
        self.next_order += 1;
        self.queue.push(Entry { due, order, task });
    }

    /// Removes and returns every task due at or before `now`, earliest first.
    /// Tasks scheduled at the same instant come back in scheduling order.
    pub fn take_due(&mut self, now: f64) -> Vec<Task> {
        let mut due = Vec::new();
        while let Some(entry) = self.queue.peek() {
            if entry.due > now {
                break;
            }
            if let Some(entry) = self.queue.pop() {
                due.push(entry.task);
            }
        }
        due
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

//! Time-ordered timer index for per-message transitions.
//!
//! Each queue owns one [`TimerQueue`]. Entries are not removed when a
//! message changes state; the owner checks a popped entry against the
//! message's current state and drops it if it no longer applies. Stale
//! entries left behind are pruned with [`TimerQueue::retain`].

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use chrono::{DateTime, Utc};

use crate::types::MessageId;

/// What a timer entry does when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Delayed message becomes available.
    DelayExpiry,
    /// In-flight message becomes visible again (or is redriven).
    VisibilityExpiry,
    /// Message exceeds its retention period.
    RetentionExpiry,
}

impl TimerKind {
    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            TimerKind::DelayExpiry => "delay",
            TimerKind::VisibilityExpiry => "visibility",
            TimerKind::RetentionExpiry => "retention",
        }
    }
}

/// A scheduled transition for one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerEntry {
    /// When the entry is due.
    pub fire_at: DateTime<Utc>,
    /// Enqueue order, breaks ties between equal fire times.
    pub seq: u64,
    /// Target message.
    pub message_id: MessageId,
    /// Transition to apply.
    pub kind: TimerKind,
}

impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.fire_at
            .cmp(&other.fire_at)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Min-heap of timer entries ordered by `(fire_at, seq)`.
#[derive(Debug, Default)]
pub struct TimerQueue {
    heap: BinaryHeap<Reverse<TimerEntry>>,
    next_seq: u64,
}

impl TimerQueue {
    /// Create an empty timer queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `kind` for `message_id` at `fire_at`.
    pub fn schedule(&mut self, fire_at: DateTime<Utc>, message_id: MessageId, kind: TimerKind) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(TimerEntry {
            fire_at,
            seq,
            message_id,
            kind,
        }));
    }

    /// Pop the earliest entry if it is due at `now`.
    pub fn pop_due(&mut self, now: DateTime<Utc>) -> Option<TimerEntry> {
        match self.heap.peek() {
            Some(Reverse(entry)) if entry.fire_at <= now => self.heap.pop().map(|Reverse(e)| e),
            _ => None,
        }
    }

    /// Number of entries, including stale ones.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Whether there are no entries.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Keep only the entries for which `keep` returns true.
    pub fn retain(&mut self, mut keep: impl FnMut(&TimerEntry) -> bool) {
        self.heap.retain(|Reverse(entry)| keep(entry));
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.heap.clear();
    }
}

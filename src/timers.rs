//! Virtual-time timer queue.
//!
//! Timers are plain data: a due instant plus the task to run. The simulator
//! pops due tasks one at a time and each task's handler re-checks state
//! before committing anything. Periodic timers are rescheduled by whoever
//! handles them.

use crate::lifecycle::OutputKind;
use std::collections::BTreeMap;

pub const HEARTBEAT_INTERVAL_MS: u64 = 100;
pub const STATUS_INTERVAL_MS: u64 = 2000;

/// Work to run when a timer fires.
#[derive(Debug, Clone, PartialEq)]
pub enum TimerTask {
    StartDone(OutputKind),
    StopDone(OutputKind),
    ReplaySaved,
    TransitionDone { id: u64 },
    Heartbeat,
    Status,
}

/// Handle to a scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(u64);

/// Timers ordered by due time, ties broken by scheduling order.
#[derive(Debug, Default)]
pub struct TimerQueue {
    next_seq: u64,
    pending: BTreeMap<(u64, TimerId), TimerTask>,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule_at(&mut self, due_ms: u64, task: TimerTask) -> TimerId {
        self.next_seq += 1;
        let id = TimerId(self.next_seq);
        self.pending.insert((due_ms, id), task);
        id
    }

    pub fn cancel(&mut self, id: TimerId) -> bool {
        let key = self.pending.keys().find(|(_, tid)| *tid == id).copied();
        match key {
            Some(key) => self.pending.remove(&key).is_some(),
            None => false,
        }
    }

    /// Drop every pending timer. Sequence numbers keep counting so stale ids
    /// never match a new timer.
    pub fn cancel_all(&mut self) {
        self.pending.clear();
    }

    pub fn next_due(&self) -> Option<u64> {
        self.pending.keys().next().map(|(due, _)| *due)
    }

    /// Remove and return the earliest timer due at or before `until_ms`.
    pub fn pop_due(&mut self, until_ms: u64) -> Option<(u64, TimerTask)> {
        let (due, _) = *self.pending.keys().next()?;
        if due > until_ms {
            return None;
        }
        self.pending
            .pop_first()
            .map(|((due, _), task)| (due, task))
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

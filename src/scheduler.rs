//! Virtual-time timer queue.
//!
//! Every delayed action in the bench (reconnect, unmute, stopwatch tick) is a
//! `TimerEvent` parked here until the loop's clock reaches its due time. Nothing
//! is ever cancelled: handlers check whether the event still applies when it fires.

use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    Reconnect,
    Unmute,
    StopwatchTick,
}

#[derive(Debug, Default)]
pub struct Scheduler {
    // (due_ms, seq) keeps FIFO order among events due at the same instant
    queue: BTreeMap<(u64, u64), TimerEvent>,
    next_seq: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule_at(&mut self, due_ms: u64, event: TimerEvent) {
        self.queue.insert((due_ms, self.next_seq), event);
        self.next_seq += 1;
    }

    pub fn schedule_in(&mut self, now_ms: u64, delay_ms: u64, event: TimerEvent) {
        self.schedule_at(now_ms.saturating_add(delay_ms), event);
    }

    /// Removes and returns the earliest event due at or before `now_ms`.
    pub fn pop_due(&mut self, now_ms: u64) -> Option<TimerEvent> {
        let key = *self.queue.keys().next()?;
        if key.0 > now_ms {
            return None;
        }
        self.queue.remove(&key)
    }

    pub fn next_due(&self) -> Option<u64> {
        self.queue.keys().next().map(|(due, _)| *due)
    }

    pub fn pending(&self, event: TimerEvent) -> usize {
        self.queue.values().filter(|e| **e == event).count()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

use super::Clock;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::cell::Cell;
use std::rc::Rc;

/// Virtual clock advanced by hand. Clones share the same time, so a test can
/// keep one handle while the bench owns another.
#[derive(Clone)]
pub struct ManualClock {
    now_ms: Rc<Cell<u64>>,
    epoch: DateTime<Utc>,
}

impl ManualClock {
    pub fn new() -> Self {
        ManualClock {
            now_ms: Rc::new(Cell::new(0)),
            epoch: Utc.timestamp_opt(1_700_000_000, 0).single().unwrap_or_default(),
        }
    }

    pub fn advance(&self, ms: u64) {
        self.now_ms.set(self.now_ms.get() + ms);
    }

    pub fn set(&self, ms: u64) {
        if ms >= self.now_ms.get() {
            self.now_ms.set(ms);
        }
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.get()
    }

    fn wall_time(&self) -> DateTime<Utc> {
        self.epoch + Duration::milliseconds(self.now_ms.get() as i64)
    }
}

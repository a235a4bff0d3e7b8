use chrono::{DateTime, Utc};

mod manual;
mod monotonic;

pub use manual::ManualClock;
pub use monotonic::MonotonicClock;

/// Time source for the event loop.
///
/// `now_ms` drives the scheduler and must never go backwards. `wall_time` is
/// only used to stamp sessions.
pub trait Clock {
    fn now_ms(&self) -> u64;
    fn wall_time(&self) -> DateTime<Utc>;
}

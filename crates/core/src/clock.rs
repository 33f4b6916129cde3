//! Receive-time clock.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

/// Hands out wall-clock receive timestamps that never go backwards.
///
/// If the system clock steps back, the last issued timestamp is repeated
/// until wall time catches up.
#[derive(Debug, Default)]
pub struct ReceiveClock {
    last: Mutex<Option<DateTime<Utc>>>,
}

impl ReceiveClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.observe(Utc::now())
    }

    fn observe(&self, wall: DateTime<Utc>) -> DateTime<Utc> {
        let mut last = self.last.lock();
        let ts = match *last {
            Some(prev) if prev > wall => prev,
            _ => wall,
        };
        *last = Some(ts);
        ts
    }
}

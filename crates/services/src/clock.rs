use std::sync::Mutex;

use chrono::{DateTime, Duration, DurationRound, Utc};
use domains::Clock;

/// Wall clock that never hands out the same instant twice.
///
/// Timestamps are truncated to microseconds (the precision PostgreSQL keeps)
/// and bumped by one microsecond when the wall clock has not moved, so
/// creation times are strictly increasing within a process.
#[derive(Debug, Default)]
pub struct SystemClock {
    last: Mutex<Option<DateTime<Utc>>>,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        let wall = Utc::now();
        let wall = wall.duration_trunc(Duration::microseconds(1)).unwrap_or(wall);

        let mut last = self.last.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let next = match *last {
            Some(previous) if wall <= previous => previous + Duration::microseconds(1),
            _ => wall,
        };
        *last = Some(next);
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strictly_increasing() {
        let clock = SystemClock::new();
        let mut previous = clock.now();
        for _ in 0..1_000 {
            let next = clock.now();
            assert!(next > previous);
            previous = next;
        }
    }
}

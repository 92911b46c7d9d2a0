//! Sliding request window

use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

/// Dispatch timestamps within a trailing window
///
/// Owned by a scheduler lane and only touched under the lane lock.
#[derive(Debug)]
pub struct SlidingWindow {
    span: Duration,
    stamps: VecDeque<Instant>,
}

impl SlidingWindow {
    pub fn new(span: Duration) -> Self {
        Self {
            span,
            stamps: VecDeque::new(),
        }
    }

    pub fn one_minute() -> Self {
        Self::new(Duration::from_secs(60))
    }

    /// Drop stamps that have left the window
    pub fn prune(&mut self, now: Instant) {
        while let Some(front) = self.stamps.front() {
            if *front + self.span <= now {
                self.stamps.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn record(&mut self, now: Instant) {
        self.stamps.push_back(now);
    }

    pub fn count(&mut self, now: Instant) -> usize {
        self.prune(now);
        self.stamps.len()
    }

    /// Earliest instant at which one more dispatch fits under `max`
    pub fn next_slot(&mut self, now: Instant, max: usize) -> Instant {
        self.prune(now);
        if self.stamps.len() < max {
            return now;
        }
        // Oldest stamps must expire until only max-1 remain
        let overflow = self.stamps.len() + 1 - max;
        match self.stamps.get(overflow - 1) {
            Some(stamp) => *stamp + self.span,
            None => now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_window_expiry() {
        let mut window = SlidingWindow::new(Duration::from_secs(10));
        let start = Instant::now();
        window.record(start);
        window.record(start + Duration::from_secs(4));

        assert_eq!(window.count(start + Duration::from_secs(5)), 2);
        assert_eq!(window.count(start + Duration::from_secs(10)), 1);
        assert_eq!(window.count(start + Duration::from_secs(14)), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_slot_when_full() {
        let mut window = SlidingWindow::new(Duration::from_secs(60));
        let start = Instant::now();
        window.record(start);
        window.record(start + Duration::from_secs(1));

        let now = start + Duration::from_secs(2);
        assert_eq!(window.next_slot(now, 3), now);
        assert_eq!(window.next_slot(now, 2), start + Duration::from_secs(60));
        assert_eq!(window.next_slot(now, 1), start + Duration::from_secs(61));
    }
}

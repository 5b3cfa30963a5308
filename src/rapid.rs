//! Rapid-tap detection for proactive attribution

use chrono::{DateTime, Duration, Utc};

/// Taps in one uninterrupted run that trigger a proactive attribution
pub const RAPID_TAP_TRIGGER: u32 = 100;

/// A gap at or above this ends the run
pub const RAPID_TAP_MAX_GAP_MS: i64 = 1000;

/// What one tap did to the run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RapidTap {
    /// Run continues (or restarts) at `run` taps
    Counting { run: u32 },
    /// Run reached the trigger; the counter has been reset
    ProactiveTrigger,
}

/// Counter of consecutive quick taps.
///
/// Callers feed it the timestamp of every tap; when it reports
/// [`RapidTap::ProactiveTrigger`] they ask the engine for a proactive
/// attribution.
#[derive(Debug, Clone, Default)]
pub struct RapidTapTracker {
    run: u32,
    last_tap: Option<DateTime<Utc>>,
}

impl RapidTapTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn run(&self) -> u32 {
        self.run
    }

    pub fn record(&mut self, now: DateTime<Utc>) -> RapidTap {
        let quick = self
            .last_tap
            .is_some_and(|last| now - last < Duration::milliseconds(RAPID_TAP_MAX_GAP_MS));
        self.run = if quick { self.run + 1 } else { 1 };
        self.last_tap = Some(now);

        if self.run >= RAPID_TAP_TRIGGER {
            self.run = 0;
            RapidTap::ProactiveTrigger
        } else {
            RapidTap::Counting { run: self.run }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 14, 0, 0).unwrap()
    }

    #[test]
    fn test_hundredth_quick_tap_triggers() {
        let mut tracker = RapidTapTracker::new();
        let mut now = start();
        for i in 1..RAPID_TAP_TRIGGER {
            assert_eq!(tracker.record(now), RapidTap::Counting { run: i });
            now += Duration::milliseconds(100);
        }
        assert_eq!(tracker.record(now), RapidTap::ProactiveTrigger);
        assert_eq!(tracker.run(), 0);
    }

    #[test]
    fn test_slow_tap_restarts_run() {
        let mut tracker = RapidTapTracker::new();
        tracker.record(start());
        tracker.record(start() + Duration::milliseconds(500));
        assert_eq!(tracker.run(), 2);

        let outcome = tracker.record(start() + Duration::milliseconds(1500));
        assert_eq!(outcome, RapidTap::Counting { run: 1 });
    }

    #[test]
    fn test_run_continues_after_trigger() {
        let mut tracker = RapidTapTracker::new();
        let mut now = start();
        for _ in 0..RAPID_TAP_TRIGGER {
            tracker.record(now);
            now += Duration::milliseconds(50);
        }
        assert_eq!(tracker.record(now), RapidTap::Counting { run: 1 });
    }
}

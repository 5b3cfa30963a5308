//! Burst-rate circuit breaker
//!
//! Stateless detector evaluated after every ingested tap. It trips while the
//! most recent `burst_events` taps all arrived within `burst_window` of now.
//! The signal is level-triggered: every evaluation that satisfies the
//! condition reports a trip, so callers decide whether to debounce.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::types::ClickEvent;

/// Default number of trailing events inspected
pub const DEFAULT_BURST_EVENTS: usize = 1000;

/// Default span those events must fit in (minutes)
pub const DEFAULT_BURST_WINDOW_MINUTES: i64 = 5;

/// Breaker thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakerConfig {
    pub burst_events: usize,
    pub burst_window_secs: i64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            burst_events: DEFAULT_BURST_EVENTS,
            burst_window_secs: DEFAULT_BURST_WINDOW_MINUTES * 60,
        }
    }
}

/// Emitted when the breaker condition holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakerTrip {
    /// Buffer length at evaluation time
    pub event_count: usize,
    /// Time from the oldest of the trailing events to now
    pub span_secs: i64,
    pub tripped_at: DateTime<Utc>,
}

/// Burst detector
#[derive(Debug, Clone, Copy, Default)]
pub struct CircuitBreaker {
    config: BreakerConfig,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self { config }
    }

    /// Evaluate the buffer (in arrival order) at `now`
    pub fn evaluate(&self, events: &[ClickEvent], now: DateTime<Utc>) -> Option<BreakerTrip> {
        let threshold = self.config.burst_events;
        if threshold == 0 || events.len() < threshold {
            return None;
        }

        let oldest_recent = events[events.len() - threshold].timestamp;
        let span = now - oldest_recent;
        if span > Duration::seconds(self.config.burst_window_secs) {
            return None;
        }

        Some(BreakerTrip {
            event_count: events.len(),
            span_secs: span.num_seconds(),
            tripped_at: now,
        })
    }
}

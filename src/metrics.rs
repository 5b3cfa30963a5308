//! Pressure metrics derivation
//!
//! Pure functions over a snapshot of the click buffer: stress density, peak
//! activity window and pressure level. Nothing here mutates state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::calendar::LocalCalendar;
use crate::types::{ClickEvent, PressureLevel};

/// Metrics computed from one buffer snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyMetrics {
    pub click_count: usize,
    pub pressure_level: PressureLevel,
    pub stress_density: f64,
    pub peak_window: Option<DateTime<Utc>>,
}

/// Metrics deriver for click buffers
pub struct PressureMetrics;

impl PressureMetrics {
    /// Derive every metric from `events` in one pass over the snapshot
    pub fn derive(events: &[ClickEvent], calendar: &LocalCalendar) -> DailyMetrics {
        DailyMetrics {
            click_count: events.len(),
            pressure_level: PressureLevel::from_count(events.len()),
            stress_density: compute_stress_density(events),
            peak_window: compute_peak_window(events, calendar),
        }
    }
}

/// Compute stress density in clicks per minute
///
/// Formula: `count / minutes(first, last)` with first and last taken from the
/// time-sorted events. Fewer than two events, or a zero-length span, yields 0.
pub fn compute_stress_density(events: &[ClickEvent]) -> f64 {
    if events.len() < 2 {
        return 0.0;
    }

    // Arrival order is not trusted to be time order
    let mut timestamps: Vec<DateTime<Utc>> = events.iter().map(|e| e.timestamp).collect();
    timestamps.sort_unstable();

    let (first, last) = match (timestamps.first(), timestamps.last()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => return 0.0,
    };

    let minutes = (last - first).num_milliseconds() as f64 / 60_000.0;
    if minutes <= 0.0 {
        return 0.0;
    }

    events.len() as f64 / minutes
}

/// Find the start of the busiest 10-minute window
///
/// Windows are aligned to the local hour (:00, :10, ... :50) with seconds
/// zeroed. Ties go to the earliest window start.
pub fn compute_peak_window(
    events: &[ClickEvent],
    calendar: &LocalCalendar,
) -> Option<DateTime<Utc>> {
    let mut window_counts: BTreeMap<DateTime<Utc>, usize> = BTreeMap::new();
    for event in events {
        *window_counts
            .entry(calendar.ten_minute_window(event.timestamp))
            .or_default() += 1;
    }

    // BTreeMap iterates in ascending window order; strict > keeps the earliest on ties
    let mut peak: Option<(DateTime<Utc>, usize)> = None;
    for (window, count) in window_counts {
        match peak {
            Some((_, best)) if count <= best => {}
            _ => peak = Some((window, count)),
        }
    }

    peak.map(|(window, _)| window)
}

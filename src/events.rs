//! Append-only buffer of the current day's taps

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::calendar::LocalCalendar;
use crate::types::ClickEvent;

/// The current day's click buffer.
///
/// Events are kept in arrival order. The buffer's day is the local day of its
/// first event; an empty buffer belongs to whatever day it is asked about.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventStore {
    events: Vec<ClickEvent>,
}

impl EventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a tap stamped at `now`
    pub fn add_event(&mut self, now: DateTime<Utc>) -> ClickEvent {
        let event = ClickEvent::at(now);
        self.events.push(event);
        event
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[ClickEvent] {
        &self.events
    }

    /// Day this buffer will settle into, falling back to `empty_day` when empty
    pub fn day(&self, calendar: &LocalCalendar, empty_day: NaiveDate) -> NaiveDate {
        self.events
            .iter()
            .map(|e| e.timestamp)
            .min()
            .map(|first| calendar.day_of(first))
            .unwrap_or(empty_day)
    }

    /// Drop every buffered event (after settlement)
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Whether any buffered event falls in the local `hour`
    pub fn any_in_hour(&self, calendar: &LocalCalendar, hour: u32) -> bool {
        self.events
            .iter()
            .any(|e| calendar.hour_of(e.timestamp) == hour)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_add_event_appends_in_order() {
        let mut store = EventStore::new();
        let t0 = Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap();

        let first = store.add_event(t0);
        let second = store.add_event(t0 + Duration::seconds(1));

        assert_eq!(store.len(), 2);
        assert_eq!(store.events()[0], first);
        assert_eq!(store.events()[1], second);
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn test_day_uses_earliest_event() {
        let calendar = LocalCalendar::utc();
        let today = NaiveDate::from_ymd_opt(2024, 1, 16).unwrap();
        let mut store = EventStore::new();

        assert_eq!(store.day(&calendar, today), today);

        store.add_event(Utc.with_ymd_and_hms(2024, 1, 15, 23, 59, 0).unwrap());
        store.add_event(Utc.with_ymd_and_hms(2024, 1, 16, 0, 1, 0).unwrap());

        assert_eq!(
            store.day(&calendar, today),
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
        );
    }

    #[test]
    fn test_any_in_hour() {
        let calendar = LocalCalendar::utc();
        let mut store = EventStore::new();
        store.add_event(Utc.with_ymd_and_hms(2024, 1, 15, 2, 59, 59).unwrap());
        assert!(!store.any_in_hour(&calendar, 3));

        store.add_event(Utc.with_ymd_and_hms(2024, 1, 15, 3, 0, 0).unwrap());
        assert!(store.any_in_hour(&calendar, 3));
    }

    #[test]
    fn test_serializes_as_plain_array() {
        let mut store = EventStore::new();
        store.add_event(Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap());

        let json = serde_json::to_string(&store).unwrap();
        assert!(json.starts_with('['));

        let parsed: EventStore = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, store);
    }
}

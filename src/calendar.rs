//! Clock and local calendar
//!
//! Every instant in the engine is a UTC timestamp. Calendar days, hours and
//! 10-minute windows are resolved through a [`LocalCalendar`] so that day
//! boundaries follow the user's wall clock rather than UTC midnight.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, Timelike, Utc};
use std::sync::Mutex;

use crate::error::PressureError;

/// Source of "now" for ingestion and settlement.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to. Used by test harnesses and replay tools.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        if let Ok(mut now) = self.now.lock() {
            *now = instant;
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now += by;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        match self.now.lock() {
            Ok(now) => *now,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// Local calendar with a fixed UTC offset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalCalendar {
    offset: FixedOffset,
}

impl Default for LocalCalendar {
    fn default() -> Self {
        Self::utc()
    }
}

impl LocalCalendar {
    pub fn utc() -> Self {
        Self {
            offset: Utc.fix(),
        }
    }

    /// Create a calendar `minutes` east of UTC (negative for west).
    pub fn with_offset_minutes(minutes: i32) -> Result<Self, PressureError> {
        let offset = minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| {
                PressureError::ConfigError(format!("UTC offset out of range: {minutes} minutes"))
            })?;
        Ok(Self { offset })
    }

    /// Local calendar day containing `instant`
    pub fn day_of(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.offset).date_naive()
    }

    /// Local hour (0-23) of `instant`
    pub fn hour_of(&self, instant: DateTime<Utc>) -> u32 {
        instant.with_timezone(&self.offset).hour()
    }

    /// UTC instant of local midnight at the start of `day`
    pub fn start_of_day(&self, day: NaiveDate) -> DateTime<Utc> {
        let local_midnight = day.and_time(NaiveTime::MIN);
        (local_midnight - Duration::seconds(i64::from(self.offset.local_minus_utc())))
            .and_utc()
    }

    /// Start of the local 10-minute window containing `instant` (seconds zeroed).
    pub fn ten_minute_window(&self, instant: DateTime<Utc>) -> DateTime<Utc> {
        let local = instant.with_timezone(&self.offset);
        let floored_minute = (local.minute() / 10) * 10;
        let start = local
            .date_naive()
            .and_hms_opt(local.hour(), floored_minute, 0)
            .unwrap_or_default();
        (start - Duration::seconds(i64::from(self.offset.local_minus_utc()))).and_utc()
    }

    /// Whole calendar days from `from` to `to` (negative when `to` is earlier)
    pub fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
        (to - from).num_days()
    }
}

//! Daily settlement
//!
//! Settlement closes the buffer's day: it finds or creates that day's record,
//! applies the streak rule, evaluates achievements and hands back the new
//! aggregates. It works on copies so the caller can persist before
//! committing, and it is idempotent: settling a day twice never duplicates
//! the record or double-counts the profile.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::achievements::{self, BufferFacts, MIDNIGHT_COMRADE_HOUR};
use crate::calendar::LocalCalendar;
use crate::events::EventStore;
use crate::metrics::PressureMetrics;
use crate::profile::{Achievement, StreakUpdate, UserProfile};
use crate::records::RecordSet;
use crate::types::PressureRecord;

/// Lifecycle of the current day's buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum SettlementPhase {
    /// Taps are accumulating
    #[default]
    Pending,
    /// A settlement transaction is in progress
    Settling,
    /// `day` has been settled and its buffer cleared
    Settled { day: NaiveDate },
}

/// What one settlement did
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementReport {
    pub day: NaiveDate,
    pub record: PressureRecord,
    /// Buffered taps this settlement flushed
    pub flushed_taps: usize,
    /// True when the day had already been counted in the profile
    pub resettled: bool,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub total_days_used: u32,
    pub newly_unlocked: Vec<Achievement>,
}

/// New aggregates produced by a settlement, not yet committed
#[derive(Debug, Clone)]
pub struct SettlementOutcome {
    pub records: RecordSet,
    pub profile: UserProfile,
    pub report: SettlementReport,
}

/// Settle the buffer's day against copies of the record set and profile
///
/// `closing` is only used to name the day of an empty buffer.
pub fn settle_day(
    events: &EventStore,
    records: &RecordSet,
    profile: &UserProfile,
    calendar: &LocalCalendar,
    closing: NaiveDate,
) -> SettlementOutcome {
    let day = events.day(calendar, closing);
    let mut records = records.clone();
    let mut profile = profile.clone();

    // An empty buffer on an existing record means this day was already flushed
    let record = match records.get(day) {
        Some(existing) if events.is_empty() => existing.clone(),
        _ => {
            let metrics = PressureMetrics::derive(events.events(), calendar);
            records.upsert_day(day, &metrics).clone()
        }
    };

    let streak = profile.apply_streak(day);
    if streak.is_new_day() {
        profile.total_days_used += 1;
    }

    let buffer = BufferFacts {
        event_count: events.len(),
        tapped_in_comrade_hour: events.any_in_hour(calendar, MIDNIGHT_COMRADE_HOUR),
    };
    let candidates = achievements::settlement_candidates(&profile, &record, &records, buffer);
    let newly_unlocked = achievements::unlock_all(&mut profile, &candidates);

    debug!(
        %day,
        click_count = record.click_count,
        streak = ?streak,
        unlocked = newly_unlocked.len(),
        "settlement computed"
    );

    let report = SettlementReport {
        day,
        record,
        flushed_taps: events.len(),
        resettled: streak == StreakUpdate::Unchanged,
        current_streak: profile.current_streak,
        longest_streak: profile.longest_streak,
        total_days_used: profile.total_days_used,
        newly_unlocked,
    };

    SettlementOutcome {
        records,
        profile,
        report,
    }
}

//! Daily settlement scheduler

use chrono::{DateTime, Duration, NaiveDate, Utc};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::calendar::LocalCalendar;
use crate::engine::PressureEngine;

/// Next local `hour:00` strictly after `now`
pub fn next_settlement_after(
    now: DateTime<Utc>,
    hour: u32,
    calendar: &LocalCalendar,
) -> DateTime<Utc> {
    let today = calendar.day_of(now);
    let candidate = calendar.start_of_day(today) + Duration::hours(i64::from(hour));
    if candidate > now {
        candidate
    } else {
        candidate + Duration::days(1)
    }
}

/// Day closed by the slot at `slot`: the local day before the one it falls in
pub fn closed_day_for_slot(slot: DateTime<Utc>, calendar: &LocalCalendar) -> NaiveDate {
    calendar.day_of(slot) - Duration::days(1)
}

/// Settle once a day at the local `hour` until `shutdown` flips to true.
///
/// A failed settlement is logged and retried at the next slot; the
/// buffer it could not close is still there.
pub async fn run_settlement_scheduler(
    engine: PressureEngine,
    hour: u32,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(hour, "settlement scheduler started");

    let mut after = engine.now();
    loop {
        let next = next_settlement_after(after, hour, engine.calendar());
        let wait = (next - engine.now()).to_std().unwrap_or_default();
        debug!(%next, wait_secs = wait.as_secs(), "next settlement scheduled");

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
        }

        match engine.settle_closing(closed_day_for_slot(next, engine.calendar())).await {
            Ok(settlement) => {
                if let Err(err) = settlement.analysis.await {
                    warn!(error = %err, "analysis task aborted");
                }
            }
            Err(err) => error!(error = %err, "scheduled settlement failed"),
        }

        // An early wake-up must not land on the same slot again
        after = engine.now().max(next);
    }

    info!("settlement scheduler stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{AnalysisAdapter, ScriptedAnalyst};
    use crate::breaker::CircuitBreaker;
    use crate::calendar::ManualClock;
    use crate::store::MemoryStore;
    use chrono::TimeZone;
    use std::sync::Arc;

    fn at(d: u32, h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, h, m, s).unwrap()
    }

    #[test]
    fn test_next_slot_later_today() {
        let calendar = LocalCalendar::utc();
        assert_eq!(
            next_settlement_after(at(15, 2, 0, 0), 3, &calendar),
            at(15, 3, 0, 0)
        );
    }

    #[test]
    fn test_next_slot_is_strictly_after_now() {
        let calendar = LocalCalendar::utc();
        assert_eq!(
            next_settlement_after(at(15, 3, 0, 0), 3, &calendar),
            at(16, 3, 0, 0)
        );
        assert_eq!(
            next_settlement_after(at(15, 10, 0, 0), 3, &calendar),
            at(16, 3, 0, 0)
        );
    }

    #[test]
    fn test_next_slot_follows_local_offset() {
        // UTC+8: 2024-01-15 04:00 local
        let calendar = LocalCalendar::with_offset_minutes(480).unwrap();
        let now = at(14, 20, 0, 0);
        // 2024-01-16 03:00 local
        assert_eq!(next_settlement_after(now, 3, &calendar), at(15, 19, 0, 0));
    }

    #[test]
    fn test_slot_closes_previous_local_day() {
        let calendar = LocalCalendar::utc();
        assert_eq!(
            closed_day_for_slot(at(16, 3, 0, 0), &calendar),
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
        );

        // 2024-01-15 19:00 UTC is 03:00 on the 16th at UTC+8
        let calendar = LocalCalendar::with_offset_minutes(480).unwrap();
        assert_eq!(
            closed_day_for_slot(at(15, 19, 0, 0), &calendar),
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduler_settles_once_per_slot_and_stops() {
        // The clock stays frozen before the slot, as if the sleep woke early
        let clock = Arc::new(ManualClock::new(at(15, 2, 59, 59)));
        let analyst = Arc::new(ScriptedAnalyst::responding("{}"));
        let engine = PressureEngine::with_parts(
            Arc::new(MemoryStore::new()),
            clock,
            AnalysisAdapter::new(analyst.clone()),
            LocalCalendar::utc(),
            CircuitBreaker::default(),
        )
        .unwrap();
        engine.add_event().unwrap();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(run_settlement_scheduler(engine.clone(), 3, shutdown_rx));

        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
        shutdown_tx.send(true).unwrap();
        task.await.unwrap();
        assert_eq!(analyst.call_count(), 1);

        let day = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let record = engine.record(day).unwrap().unwrap();
        assert_eq!(record.click_count, 1);
        assert!(record.ai_analysis.is_some());
        assert_eq!(engine.today_count().unwrap(), 0);
        assert_eq!(engine.profile().unwrap().total_days_used, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_day_settles_under_its_own_date() {
        let clock = Arc::new(ManualClock::new(at(1, 12, 0, 0)));
        let engine = PressureEngine::with_parts(
            Arc::new(MemoryStore::new()),
            clock.clone(),
            AnalysisAdapter::new(Arc::new(ScriptedAnalyst::responding("{}"))),
            LocalCalendar::utc(),
            CircuitBreaker::default(),
        )
        .unwrap();
        engine.add_event().unwrap();
        clock.set(at(2, 2, 59, 59));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(run_settlement_scheduler(engine.clone(), 3, shutdown_rx));

        // Slot at 01-02 03:00 closes the tapped day
        tokio::time::sleep(std::time::Duration::from_millis(1500)).await;
        let day1 = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert_eq!(engine.record(day1).unwrap().unwrap().click_count, 1);
        assert_eq!(engine.profile().unwrap().total_days_used, 1);

        // Slot at 01-03 03:00 closes the untouched 01-02
        clock.set(at(3, 3, 0, 0));
        tokio::time::sleep(std::time::Duration::from_secs(86_401)).await;
        shutdown_tx.send(true).unwrap();
        task.await.unwrap();

        let day2 = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let day3 = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
        assert_eq!(engine.record(day2).unwrap().unwrap().click_count, 0);
        assert!(engine.record(day3).unwrap().is_none());

        let profile = engine.profile().unwrap();
        assert_eq!(profile.current_streak, 2);
        assert_eq!(profile.total_days_used, 2);
        assert_eq!(profile.last_active_date, Some(day2));
    }
}

//! Achievement evaluation
//!
//! Predicates run against the profile, the just-settled record and the recent
//! record history. Unlocks are a monotonic union into the profile.

use crate::profile::{Achievement, UserProfile};
use crate::records::RecordSet;
use crate::types::{PressureLevel, PressureRecord};

/// Streak length for Workplace Ninja
pub const NINJA_STREAK_DAYS: u32 = 7;

/// Streak length for Survivor
pub const SURVIVOR_STREAK_DAYS: u32 = 30;

/// Single-day click count for PPT Terminator
pub const PPT_TERMINATOR_CLICKS: usize = 500;

/// Buffer size for Volcano
pub const VOLCANO_CLICKS: usize = 1000;

/// Calm records required for Zen Master
pub const ZEN_MASTER_CALM_DAYS: usize = 3;

/// Local hour (03:00-04:00) for Midnight Comrade
pub const MIDNIGHT_COMRADE_HOUR: u32 = 3;

/// Facts about the buffer being settled, captured before it is cleared
#[derive(Debug, Clone, Copy, Default)]
pub struct BufferFacts {
    pub event_count: usize,
    pub tapped_in_comrade_hour: bool,
}

/// Achievements whose conditions hold at settlement time
pub fn settlement_candidates(
    profile: &UserProfile,
    settled: &PressureRecord,
    records: &RecordSet,
    buffer: BufferFacts,
) -> Vec<Achievement> {
    let mut earned = Vec::new();

    if profile.current_streak >= NINJA_STREAK_DAYS {
        earned.push(Achievement::WorkplaceNinja);
    }
    if profile.current_streak >= SURVIVOR_STREAK_DAYS {
        earned.push(Achievement::Survivor);
    }
    if settled.click_count >= PPT_TERMINATOR_CLICKS {
        earned.push(Achievement::PptTerminator);
    }

    let recent = records.recent(settled.date, ZEN_MASTER_CALM_DAYS as u32);
    if recent.len() == ZEN_MASTER_CALM_DAYS
        && recent.iter().all(|r| r.pressure_level == PressureLevel::Calm)
    {
        earned.push(Achievement::ZenMaster);
    }

    earned.extend(live_candidates(buffer));
    earned
}

/// Achievements detectable from the live buffer alone
pub fn live_candidates(buffer: BufferFacts) -> Vec<Achievement> {
    let mut earned = Vec::new();
    if buffer.event_count >= VOLCANO_CLICKS {
        earned.push(Achievement::Volcano);
    }
    if buffer.tapped_in_comrade_hour {
        earned.push(Achievement::MidnightComrade);
    }
    earned
}

/// Union `candidates` into the profile, returning the ones newly unlocked
pub fn unlock_all(profile: &mut UserProfile, candidates: &[Achievement]) -> Vec<Achievement> {
    candidates
        .iter()
        .copied()
        .filter(|a| profile.unlock(*a))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::DailyMetrics;
    use chrono::{Duration, NaiveDate};
    use pretty_assertions::assert_eq;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn calm() -> DailyMetrics {
        DailyMetrics {
            click_count: 0,
            pressure_level: PressureLevel::Calm,
            stress_density: 0.0,
            peak_window: None,
        }
    }

    fn records_with_calm_days(last: NaiveDate, count: i64) -> RecordSet {
        let mut set = RecordSet::new();
        for offset in 0..count {
            set.upsert_day(last - Duration::days(offset), &calm());
        }
        set
    }

    #[test]
    fn test_streak_achievements() {
        let records = records_with_calm_days(day(20), 1);
        let settled = records.get(day(20)).unwrap().clone();

        let profile = UserProfile {
            current_streak: 7,
            ..Default::default()
        };
        let earned = settlement_candidates(&profile, &settled, &records, BufferFacts::default());
        assert!(earned.contains(&Achievement::WorkplaceNinja));
        assert!(!earned.contains(&Achievement::Survivor));

        let profile = UserProfile {
            current_streak: 30,
            ..Default::default()
        };
        let earned = settlement_candidates(&profile, &settled, &records, BufferFacts::default());
        assert!(earned.contains(&Achievement::Survivor));
    }

    #[test]
    fn test_ppt_terminator_threshold() {
        let mut records = RecordSet::new();
        let busy = DailyMetrics {
            click_count: 500,
            pressure_level: PressureLevel::Severe,
            stress_density: 4.0,
            peak_window: None,
        };
        let settled = records.upsert_day(day(20), &busy).clone();

        let earned = settlement_candidates(
            &UserProfile::default(),
            &settled,
            &records,
            BufferFacts::default(),
        );
        assert_eq!(earned, vec![Achievement::PptTerminator]);
    }

    #[test]
    fn test_zen_master_needs_three_calm_records() {
        for (count, expected) in [(1, false), (2, false), (3, true), (10, true)] {
            let records = records_with_calm_days(day(20), count);
            let settled = records.get(day(20)).unwrap().clone();

            let earned = settlement_candidates(
                &UserProfile::default(),
                &settled,
                &records,
                BufferFacts::default(),
            );
            assert_eq!(
                earned.contains(&Achievement::ZenMaster),
                expected,
                "{count} calm records"
            );
        }
    }

    #[test]
    fn test_zen_master_requires_all_calm() {
        let mut records = records_with_calm_days(day(20), 3);
        let mild = DailyMetrics {
            click_count: 5,
            pressure_level: PressureLevel::Mild,
            stress_density: 0.1,
            peak_window: None,
        };
        records.upsert_day(day(19), &mild);
        let settled = records.get(day(20)).unwrap().clone();

        let earned = settlement_candidates(
            &UserProfile::default(),
            &settled,
            &records,
            BufferFacts::default(),
        );
        assert!(!earned.contains(&Achievement::ZenMaster));
    }

    #[test]
    fn test_zen_master_after_a_mild_day() {
        let mild = DailyMetrics {
            click_count: 5,
            pressure_level: PressureLevel::Mild,
            stress_density: 0.1,
            peak_window: None,
        };
        let mut records = RecordSet::new();
        records.upsert_day(day(10), &mild);

        for d in 11..=20 {
            let settled = records.upsert_day(day(d), &calm()).clone();
            let earned = settlement_candidates(
                &UserProfile::default(),
                &settled,
                &records,
                BufferFacts::default(),
            );
            assert_eq!(
                earned.contains(&Achievement::ZenMaster),
                d >= 13,
                "calm through day {d}"
            );
        }
    }

    #[test]
    fn test_live_candidates() {
        assert!(live_candidates(BufferFacts {
            event_count: 999,
            tapped_in_comrade_hour: false
        })
        .is_empty());

        assert_eq!(
            live_candidates(BufferFacts {
                event_count: 1000,
                tapped_in_comrade_hour: true
            }),
            vec![Achievement::Volcano, Achievement::MidnightComrade]
        );
    }

    #[test]
    fn test_unlock_all_reports_only_new() {
        let mut profile = UserProfile {
            achievements: vec![Achievement::Volcano],
            ..Default::default()
        };

        let new = unlock_all(&mut profile, &[Achievement::Volcano, Achievement::ZenMaster]);
        assert_eq!(new, vec![Achievement::ZenMaster]);
        assert_eq!(profile.achievements.len(), 2);
    }
}

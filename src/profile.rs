//! User profile and achievements
//!
//! The profile is a singleton aggregate holding longitudinal usage statistics.
//! Settlement is its sole writer apart from the per-tap `total_clicks` counter.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::calendar::LocalCalendar;

/// Fixed catalogue of unlockable achievements
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Achievement {
    /// Seven consecutive settled days
    WorkplaceNinja,
    /// 500+ taps in a single day
    PptTerminator,
    /// Tapped during the 03:00-04:00 local hour
    MidnightComrade,
    /// Thirty consecutive settled days
    Survivor,
    /// Three calm days in a row
    ZenMaster,
    /// 1000+ taps in the current day's buffer
    Volcano,
}

impl Achievement {
    pub const ALL: [Achievement; 6] = [
        Achievement::WorkplaceNinja,
        Achievement::PptTerminator,
        Achievement::MidnightComrade,
        Achievement::Survivor,
        Achievement::ZenMaster,
        Achievement::Volcano,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            Achievement::WorkplaceNinja => "Workplace Ninja",
            Achievement::PptTerminator => "PPT Terminator",
            Achievement::MidnightComrade => "3 A.M. Comrade",
            Achievement::Survivor => "Workplace Survivor",
            Achievement::ZenMaster => "Zen Master",
            Achievement::Volcano => "Volcano",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Achievement::WorkplaceNinja => "Logged pressure seven days in a row.",
            Achievement::PptTerminator => "Over 500 taps in one day. Slides can no longer hurt you.",
            Achievement::MidnightComrade => "Still here at 3 a.m. We get it.",
            Achievement::Survivor => "Thirty days in a row. A true survivor.",
            Achievement::ZenMaster => "Three calm days in a row.",
            Achievement::Volcano => "Over 1000 taps before a single settlement.",
        }
    }
}

/// Outcome of applying the streak rule for a settled day
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreakUpdate {
    /// No previous active day
    Started,
    /// Settled the day after the last active day
    Extended,
    /// The day was already counted
    Unchanged,
    /// A gap of more than one day reset the streak
    Reset,
}

impl StreakUpdate {
    /// Whether the day counts as a newly used day
    pub fn is_new_day(&self) -> bool {
        !matches!(self, StreakUpdate::Unchanged)
    }
}

/// Singleton usage profile
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default)]
    pub achievements: Vec<Achievement>,
    pub total_days_used: u32,
    pub total_clicks: u64,
    pub longest_streak: u32,
    pub current_streak: u32,
    #[serde(default)]
    pub last_active_date: Option<NaiveDate>,
    #[serde(default)]
    pub resume_backup_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub has_resume_backup: bool,
}

impl UserProfile {
    pub fn has_achievement(&self, achievement: Achievement) -> bool {
        self.achievements.contains(&achievement)
    }

    /// Add `achievement` if not already held. Returns true when newly unlocked.
    pub fn unlock(&mut self, achievement: Achievement) -> bool {
        if self.has_achievement(achievement) {
            return false;
        }
        self.achievements.push(achievement);
        true
    }

    /// Apply the streak rule for settling `day`
    ///
    /// - no previous active day: streak starts at 1
    /// - previous day was yesterday: streak grows, longest streak follows
    /// - same day (or earlier): no change at all
    /// - gap: streak resets to 1
    ///
    /// `last_active_date` moves to `day` on every path except the no-op.
    pub fn apply_streak(&mut self, day: NaiveDate) -> StreakUpdate {
        let update = match self.last_active_date {
            None => {
                self.current_streak = 1;
                StreakUpdate::Started
            }
            Some(last) => match LocalCalendar::days_between(last, day) {
                1 => {
                    self.current_streak += 1;
                    StreakUpdate::Extended
                }
                d if d <= 0 => return StreakUpdate::Unchanged,
                _ => {
                    self.current_streak = 1;
                    StreakUpdate::Reset
                }
            },
        };

        self.longest_streak = self.longest_streak.max(self.current_streak);
        self.last_active_date = Some(day);
        update
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[test]
    fn test_first_settlement_starts_streak() {
        let mut profile = UserProfile::default();

        assert_eq!(profile.apply_streak(day(10)), StreakUpdate::Started);
        assert_eq!(profile.current_streak, 1);
        assert_eq!(profile.longest_streak, 1);
        assert_eq!(profile.last_active_date, Some(day(10)));
    }

    #[test]
    fn test_consecutive_day_extends_streak() {
        let mut profile = UserProfile {
            current_streak: 5,
            longest_streak: 5,
            last_active_date: Some(day(9)),
            ..Default::default()
        };

        assert_eq!(profile.apply_streak(day(10)), StreakUpdate::Extended);
        assert_eq!(profile.current_streak, 6);
        assert_eq!(profile.longest_streak, 6);
    }

    #[test]
    fn test_longest_streak_is_kept_when_higher() {
        let mut profile = UserProfile {
            current_streak: 5,
            longest_streak: 12,
            last_active_date: Some(day(9)),
            ..Default::default()
        };

        profile.apply_streak(day(10));
        assert_eq!(profile.current_streak, 6);
        assert_eq!(profile.longest_streak, 12);
    }

    #[test]
    fn test_gap_resets_streak() {
        let mut profile = UserProfile {
            current_streak: 9,
            longest_streak: 9,
            last_active_date: Some(day(7)),
            ..Default::default()
        };

        assert_eq!(profile.apply_streak(day(10)), StreakUpdate::Reset);
        assert_eq!(profile.current_streak, 1);
        assert_eq!(profile.longest_streak, 9);
        assert_eq!(profile.last_active_date, Some(day(10)));
    }

    #[test]
    fn test_same_day_is_noop() {
        let mut profile = UserProfile {
            current_streak: 3,
            longest_streak: 4,
            last_active_date: Some(day(10)),
            ..Default::default()
        };
        let before = profile.clone();

        assert_eq!(profile.apply_streak(day(10)), StreakUpdate::Unchanged);
        assert_eq!(profile, before);
    }

    #[test]
    fn test_unlock_is_monotonic() {
        let mut profile = UserProfile::default();

        assert!(profile.unlock(Achievement::Volcano));
        assert!(!profile.unlock(Achievement::Volcano));
        assert_eq!(profile.achievements, vec![Achievement::Volcano]);
    }

    #[test]
    fn test_profile_round_trip() {
        let profile = UserProfile {
            achievements: vec![Achievement::ZenMaster, Achievement::MidnightComrade],
            total_days_used: 12,
            total_clicks: 4_321,
            longest_streak: 8,
            current_streak: 2,
            last_active_date: Some(day(10)),
            resume_backup_date: None,
            has_resume_backup: false,
        };

        let json = serde_json::to_string(&profile).unwrap();
        assert!(json.contains("\"zenMaster\""));
        assert!(json.contains("\"lastActiveDate\":\"2024-01-10\""));

        let parsed: UserProfile = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, profile);
    }
}

//! Core data types
//!
//! These are the entities that flow from tap ingestion through settlement and
//! analysis, and the shapes persisted by the key-value store.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single tap. Immutable once created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClickEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
}

impl ClickEvent {
    pub fn at(timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp,
        }
    }
}

/// Upper bound (inclusive) of the Mild level
pub const MILD_MAX_CLICKS: usize = 50;

/// Upper bound (inclusive) of the Moderate level
pub const MODERATE_MAX_CLICKS: usize = 200;

/// Pressure level derived from a day's click count
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PressureLevel {
    Calm,
    Mild,
    Moderate,
    Severe,
}

impl PressureLevel {
    /// Classify a click count: 0 → Calm, 1-50 → Mild, 51-200 → Moderate, 201+ → Severe
    pub fn from_count(count: usize) -> Self {
        match count {
            0 => PressureLevel::Calm,
            1..=MILD_MAX_CLICKS => PressureLevel::Mild,
            c if c <= MODERATE_MAX_CLICKS => PressureLevel::Moderate,
            _ => PressureLevel::Severe,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PressureLevel::Calm => "calm",
            PressureLevel::Mild => "mild",
            PressureLevel::Moderate => "moderate",
            PressureLevel::Severe => "severe",
        }
    }
}

impl std::fmt::Display for PressureLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One named contributor to a day's stress.
///
/// Percentages come from the analysis collaborator and are not required to sum to 100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressFactor {
    pub name: String,
    pub percentage: f64,
}

/// Analysis attached to a settled record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiAnalysis {
    pub timestamp: DateTime<Utc>,
    /// Free-form tag such as "acute" or "chronic"; "unknown" for the local fallback
    pub pressure_type: String,
    /// Resignation index (0-100)
    pub resignation_index: u8,
    pub insight: String,
    pub quote: String,
    #[serde(default)]
    pub stress_factors: Vec<StressFactor>,
}

/// The durable per-day record. At most one exists per calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PressureRecord {
    pub id: Uuid,
    pub date: NaiveDate,
    pub click_count: usize,
    pub pressure_level: PressureLevel,
    #[serde(default)]
    pub peak_time: Option<DateTime<Utc>>,
    /// Clicks per minute over the day's span
    pub stress_density: f64,
    #[serde(default)]
    pub ai_analysis: Option<AiAnalysis>,
    #[serde(default)]
    pub user_notes: Option<String>,
}

impl PressureRecord {
    /// Empty record for `date`
    pub fn new(date: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4(),
            date,
            click_count: 0,
            pressure_level: PressureLevel::Calm,
            peak_time: None,
            stress_density: 0.0,
            ai_analysis: None,
            user_notes: None,
        }
    }

    /// Update the click count and recompute the level that depends on it
    pub fn set_click_count(&mut self, count: usize) {
        self.click_count = count;
        self.pressure_level = PressureLevel::from_count(count);
    }
}

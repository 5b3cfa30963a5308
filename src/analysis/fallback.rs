//! Local fallback heuristic
//!
//! Used whenever the analysis service is unavailable or answers with a shape
//! we cannot use. Depends only on the record, so it is deterministic apart
//! from the timestamp.

use chrono::{DateTime, Utc};

use crate::types::{AiAnalysis, PressureLevel, PressureRecord};

/// Pressure type reported by the fallback
pub const FALLBACK_PRESSURE_TYPE: &str = "unknown";

/// Insight reported by the fallback
pub const FALLBACK_INSIGHT: &str = "Your data is still being analyzed. Check back a little later.";

/// Quote reported by the fallback
pub const FALLBACK_QUOTE: &str =
    "Work may be a battlefield, but you don't have to charge every single time.";

/// Largest density bonus added to the base index
const MAX_DENSITY_BONUS: u32 = 15;

fn base_index(level: PressureLevel) -> u32 {
    match level {
        PressureLevel::Calm => 10,
        PressureLevel::Mild => 30,
        PressureLevel::Moderate => 60,
        PressureLevel::Severe => 85,
    }
}

/// Resignation index from level and density
///
/// Formula: `min(base(level) + min(floor(density * 2), 15), 100)`
/// with base Calm=10, Mild=30, Moderate=60, Severe=85.
pub fn fallback_resignation_index(level: PressureLevel, stress_density: f64) -> u8 {
    let bonus = if stress_density.is_finite() && stress_density > 0.0 {
        ((stress_density * 2.0).floor() as u32).min(MAX_DENSITY_BONUS)
    } else {
        0
    };
    (base_index(level) + bonus).min(100) as u8
}

/// Full fallback analysis for `record`
pub fn fallback_analysis(record: &PressureRecord, now: DateTime<Utc>) -> AiAnalysis {
    AiAnalysis {
        timestamp: now,
        pressure_type: FALLBACK_PRESSURE_TYPE.to_string(),
        resignation_index: fallback_resignation_index(record.pressure_level, record.stress_density),
        insight: FALLBACK_INSIGHT.to_string(),
        quote: FALLBACK_QUOTE.to_string(),
        stress_factors: Vec::new(),
    }
}

/// Templated sentence used when proactive attribution fails
pub fn fallback_attribution(click_count: usize) -> String {
    format!("Looks like you've hit {click_count} taps today. That's a lot of pressure.")
}

//! Analysis collaborator contract

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;
use crate::types::{AiAnalysis, PressureLevel, PressureRecord};

/// Record summary sent to the analysis service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    pub date: NaiveDate,
    pub click_count: usize,
    pub pressure_level: PressureLevel,
    pub stress_density: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peak_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_notes: Option<String>,
}

impl From<&PressureRecord> for AnalysisRequest {
    fn from(record: &PressureRecord) -> Self {
        Self {
            date: record.date,
            click_count: record.click_count,
            pressure_level: record.pressure_level,
            stress_density: record.stress_density,
            peak_time: record.peak_time,
            user_notes: record.user_notes.clone().filter(|n| !n.is_empty()),
        }
    }
}

/// External analysis service.
///
/// Implementations may fail freely; callers go through
/// [`AnalysisAdapter`](super::AnalysisAdapter), which absorbs every failure.
#[async_trait]
pub trait PressureAnalyst: Send + Sync {
    /// Short identifier used in logs
    fn id(&self) -> &str;

    /// Produce a structured analysis for one settled day
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AiAnalysis, AnalysisError>;

    /// One friendly sentence asking about an abnormal burst of taps
    async fn proactive_attribution(
        &self,
        click_count: usize,
        peak_time: Option<DateTime<Utc>>,
    ) -> Result<String, AnalysisError>;
}

//! Timeout and fallback wrapper around the analysis collaborator

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::fallback::{fallback_analysis, fallback_attribution};
use super::traits::{AnalysisRequest, PressureAnalyst};
use crate::error::AnalysisError;
use crate::types::{AiAnalysis, PressureRecord};

/// Default bound on a single collaborator call
pub const DEFAULT_ANALYSIS_TIMEOUT: Duration = Duration::from_secs(30);

/// Where an analysis came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisSource {
    Collaborator,
    Fallback,
}

/// Analyst wrapper that never fails
#[derive(Clone)]
pub struct AnalysisAdapter {
    analyst: Arc<dyn PressureAnalyst>,
    timeout: Duration,
}

impl AnalysisAdapter {
    pub fn new(analyst: Arc<dyn PressureAnalyst>) -> Self {
        Self {
            analyst,
            timeout: DEFAULT_ANALYSIS_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Call the collaborator, mapping an elapsed timeout to a transport error
    pub async fn try_analyze(&self, record: &PressureRecord) -> Result<AiAnalysis, AnalysisError> {
        let request = AnalysisRequest::from(record);
        match tokio::time::timeout(self.timeout, self.analyst.analyze(&request)).await {
            Ok(result) => result,
            Err(_) => Err(AnalysisError::TransportError(format!(
                "timed out after {:?}",
                self.timeout
            ))),
        }
    }

    /// Analysis for `record`, falling back to the local heuristic on any failure
    pub async fn analyze_or_fallback(&self, record: &PressureRecord) -> (AiAnalysis, AnalysisSource) {
        match self.try_analyze(record).await {
            Ok(analysis) => {
                debug!(analyst = self.analyst.id(), day = %record.date, "analysis received");
                (analysis, AnalysisSource::Collaborator)
            }
            Err(err) => {
                warn!(
                    analyst = self.analyst.id(),
                    day = %record.date,
                    error = %err,
                    "analysis failed, using local fallback"
                );
                (fallback_analysis(record, Utc::now()), AnalysisSource::Fallback)
            }
        }
    }

    /// Ask about an abnormal burst; templated sentence on any failure
    pub async fn proactive_attribution(
        &self,
        click_count: usize,
        peak_time: Option<DateTime<Utc>>,
    ) -> String {
        let call = self.analyst.proactive_attribution(click_count, peak_time);
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(sentence)) => sentence,
            Ok(Err(err)) => {
                debug!(error = %err, "proactive attribution failed");
                fallback_attribution(click_count)
            }
            Err(_) => {
                debug!("proactive attribution timed out");
                fallback_attribution(click_count)
            }
        }
    }
}

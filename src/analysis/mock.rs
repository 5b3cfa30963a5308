//! Scripted analyst for tests and offline runs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use super::chat::parse_analysis_content;
use super::traits::{AnalysisRequest, PressureAnalyst};
use crate::error::AnalysisError;
use crate::types::AiAnalysis;

/// Analyst that replays a fixed outcome.
///
/// The outcome is either a raw assistant payload (parsed exactly like a real
/// response) or a fixed error. An optional delay simulates a slow service.
pub struct ScriptedAnalyst {
    outcome: Result<String, AnalysisError>,
    delay: Option<Duration>,
    call_count: AtomicU32,
}

impl ScriptedAnalyst {
    /// Answer every call with `payload`
    pub fn responding(payload: impl Into<String>) -> Self {
        Self {
            outcome: Ok(payload.into()),
            delay: None,
            call_count: AtomicU32::new(0),
        }
    }

    /// Fail every call with `error`
    pub fn failing(error: AnalysisError) -> Self {
        Self {
            outcome: Err(error),
            delay: None,
            call_count: AtomicU32::new(0),
        }
    }

    /// Sleep before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of collaborator calls made so far
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }

    async fn respond(&self) -> Result<String, AnalysisError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.outcome.clone()
    }
}

#[async_trait]
impl PressureAnalyst for ScriptedAnalyst {
    fn id(&self) -> &str {
        "scripted"
    }

    async fn analyze(&self, _request: &AnalysisRequest) -> Result<AiAnalysis, AnalysisError> {
        let payload = self.respond().await?;
        parse_analysis_content(&payload, Utc::now())
    }

    async fn proactive_attribution(
        &self,
        _click_count: usize,
        _peak_time: Option<DateTime<Utc>>,
    ) -> Result<String, AnalysisError> {
        self.respond().await
    }
}

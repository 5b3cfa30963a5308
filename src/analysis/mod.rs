//! Analysis adapter
//!
//! Settled records are enriched by an external analysis service. The
//! collaborator is reached through the [`PressureAnalyst`] trait; the
//! [`AnalysisAdapter`] wraps it with a bounded timeout and a deterministic
//! local fallback so enrichment never fails or stalls settlement.
//!
//! Pipeline: PressureRecord → AnalysisRequest → PressureAnalyst → AiAnalysis
//! (or fallback on any failure)

pub mod adapter;
pub mod chat;
pub mod fallback;
pub mod mock;
pub mod traits;

pub use adapter::{AnalysisAdapter, AnalysisSource, DEFAULT_ANALYSIS_TIMEOUT};
pub use chat::ChatCompletionsAnalyst;
pub use fallback::{fallback_analysis, fallback_attribution, fallback_resignation_index};
pub use mock::ScriptedAnalyst;
pub use traits::{AnalysisRequest, PressureAnalyst};

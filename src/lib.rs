//! Pressure Flux - tap aggregation and daily settlement engine
//!
//! Flux turns a stream of user taps into stress metrics and, once a day,
//! settles the day's buffer into a permanent record:
//! tap ingestion → live metrics and circuit breaker → settlement (record,
//! streak, achievements) → analysis enrichment with a local fallback.
//!
//! ## Modules
//!
//! - **Engine**: the shared context object used by ingestion and settlement
//! - **Analysis**: the external analyst boundary and its deterministic fallback
//! - **Store**: JSON persistence of the buffer, records and profile

pub mod achievements;
pub mod analysis;
pub mod breaker;
pub mod calendar;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod metrics;
pub mod profile;
pub mod rapid;
pub mod records;
pub mod scheduler;
pub mod settlement;
pub mod store;
pub mod types;

pub use analysis::{AnalysisAdapter, AnalysisSource, PressureAnalyst};
pub use breaker::{BreakerConfig, BreakerTrip, CircuitBreaker};
pub use calendar::{Clock, LocalCalendar, ManualClock, SystemClock};
pub use config::EngineConfig;
pub use engine::{EngineStatus, PressureEngine, Settlement, TapOutcome};
pub use error::{AnalysisError, PressureError};
pub use profile::{Achievement, UserProfile};
pub use rapid::{RapidTap, RapidTapTracker};
pub use scheduler::{next_settlement_after, run_settlement_scheduler};
pub use settlement::{SettlementPhase, SettlementReport};
pub use store::{FileStore, KeyValueStore, MemoryStore};
pub use types::{AiAnalysis, ClickEvent, PressureLevel, PressureRecord, StressFactor};

/// Engine version reported by the CLI
pub const FLUX_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name reported by the CLI
pub const PRODUCER_NAME: &str = "pressure-flux";

//! Engine context object
//!
//! [`PressureEngine`] owns the shared state (click buffer, record set,
//! profile and settlement phase) behind a single mutex and is handed by
//! clone to both the ingestion path and the scheduled settlement path.
//! Every mutation happens under that lock; the network-bound analysis call
//! runs outside it and attaches its result through a short re-lock.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::achievements::{self, BufferFacts, MIDNIGHT_COMRADE_HOUR};
use crate::analysis::{AnalysisAdapter, AnalysisSource, ChatCompletionsAnalyst};
use crate::breaker::{BreakerTrip, CircuitBreaker};
use crate::calendar::{Clock, LocalCalendar, SystemClock};
use crate::config::EngineConfig;
use crate::error::PressureError;
use crate::events::EventStore;
use crate::metrics::{compute_peak_window, compute_stress_density};
use crate::profile::{Achievement, UserProfile};
use crate::records::RecordSet;
use crate::settlement::{settle_day, SettlementOutcome, SettlementPhase, SettlementReport};
use crate::store::{
    save_json, FileStore, KeyValueStore, Snapshot, PROFILE_KEY, RECORDS_KEY, TODAY_CLICKS_KEY,
};
use crate::types::{AiAnalysis, ClickEvent, PressureLevel, PressureRecord};

/// Mutable state guarded by the engine lock
#[derive(Debug, Default)]
struct EngineState {
    events: EventStore,
    records: RecordSet,
    profile: UserProfile,
    phase: SettlementPhase,
}

/// Result of a single tap
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TapOutcome {
    pub event: ClickEvent,
    pub today_count: usize,
    /// Present whenever the burst condition holds after this tap
    pub breaker: Option<BreakerTrip>,
    pub unlocked: Vec<Achievement>,
    /// Set when the tap is counted in memory but could not be written
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persist_error: Option<String>,
}

/// One consistent read of the live counters
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStatus {
    pub day: NaiveDate,
    pub today_count: usize,
    pub level: PressureLevel,
    pub stress_density: f64,
    pub peak_window: Option<DateTime<Utc>>,
    pub phase: SettlementPhase,
    pub profile: UserProfile,
}

/// A committed settlement and its pending analysis
#[derive(Debug)]
pub struct Settlement {
    pub report: SettlementReport,
    /// Resolves once the analysis (or its fallback) is attached to the record
    pub analysis: JoinHandle<AnalysisSource>,
}

/// Pressure aggregation and settlement engine
#[derive(Clone)]
pub struct PressureEngine {
    state: Arc<Mutex<EngineState>>,
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    calendar: LocalCalendar,
    breaker: CircuitBreaker,
    analysis: AnalysisAdapter,
}

impl PressureEngine {
    /// Open an engine on the configured data directory with the HTTP analyst
    pub fn open(config: &EngineConfig) -> Result<Self, PressureError> {
        config.validate()?;
        let store = FileStore::open(&config.data_dir)?;
        let analyst = ChatCompletionsAnalyst::new(&config.analysis)?;
        let analysis = AnalysisAdapter::new(Arc::new(analyst))
            .with_timeout(Duration::from_secs(config.analysis.timeout_secs));

        Self::with_parts(
            Arc::new(store),
            Arc::new(SystemClock),
            analysis,
            config.calendar()?,
            CircuitBreaker::new(config.breaker),
        )
    }

    /// Assemble an engine from explicit collaborators, loading persisted state
    pub fn with_parts(
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        analysis: AnalysisAdapter,
        calendar: LocalCalendar,
        breaker: CircuitBreaker,
    ) -> Result<Self, PressureError> {
        let snapshot = Snapshot::load(store.as_ref())?;
        info!(
            buffered = snapshot.events.len(),
            records = snapshot.records.len(),
            total_clicks = snapshot.profile.total_clicks,
            "engine state loaded"
        );

        let state = EngineState {
            events: snapshot.events,
            records: snapshot.records,
            profile: snapshot.profile,
            phase: SettlementPhase::Pending,
        };

        Ok(Self {
            state: Arc::new(Mutex::new(state)),
            store,
            clock,
            calendar,
            breaker,
            analysis,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, EngineState>, PressureError> {
        self.state.lock().map_err(|_| PressureError::LockPoisoned)
    }

    pub fn calendar(&self) -> &LocalCalendar {
        &self.calendar
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Local calendar day of the engine clock
    pub fn today(&self) -> NaiveDate {
        self.calendar.day_of(self.clock.now())
    }

    // -- ingestion --------------------------------------------------------

    /// Record one tap.
    ///
    /// The tap is counted in memory before anything is written. A failed
    /// write is reported in [`TapOutcome::persist_error`] so the breaker
    /// signal and unlocks still reach the caller.
    pub fn add_event(&self) -> Result<TapOutcome, PressureError> {
        let now = self.clock.now();
        let mut state = self.lock()?;

        let event = state.events.add_event(now);
        state.profile.total_clicks += 1;
        if matches!(state.phase, SettlementPhase::Settled { .. }) {
            state.phase = SettlementPhase::Pending;
        }

        let breaker = self.breaker.evaluate(state.events.events(), now);
        if let Some(trip) = &breaker {
            warn!(
                event_count = trip.event_count,
                span_secs = trip.span_secs,
                "circuit breaker tripped"
            );
        }

        let facts = BufferFacts {
            event_count: state.events.len(),
            tapped_in_comrade_hour: self.calendar.hour_of(now) == MIDNIGHT_COMRADE_HOUR,
        };
        let unlocked =
            achievements::unlock_all(&mut state.profile, &achievements::live_candidates(facts));
        for achievement in &unlocked {
            info!(achievement = achievement.title(), "achievement unlocked");
        }

        let persist_error = self.persist_tap(&state).err().map(|err| {
            warn!(error = %err, "failed to persist tap");
            err.to_string()
        });

        Ok(TapOutcome {
            event,
            today_count: state.events.len(),
            breaker,
            unlocked,
            persist_error,
        })
    }

    fn persist_tap(&self, state: &EngineState) -> Result<(), PressureError> {
        save_json(self.store.as_ref(), TODAY_CLICKS_KEY, &state.events)?;
        save_json(self.store.as_ref(), PROFILE_KEY, &state.profile)
    }

    // -- live reads -------------------------------------------------------

    pub fn today_count(&self) -> Result<usize, PressureError> {
        Ok(self.lock()?.events.len())
    }

    pub fn stress_density(&self) -> Result<f64, PressureError> {
        Ok(compute_stress_density(self.lock()?.events.events()))
    }

    pub fn peak_window(&self) -> Result<Option<DateTime<Utc>>, PressureError> {
        Ok(compute_peak_window(self.lock()?.events.events(), &self.calendar))
    }

    pub fn level(&self) -> Result<PressureLevel, PressureError> {
        Ok(PressureLevel::from_count(self.today_count()?))
    }

    pub fn phase(&self) -> Result<SettlementPhase, PressureError> {
        Ok(self.lock()?.phase)
    }

    pub fn profile(&self) -> Result<UserProfile, PressureError> {
        Ok(self.lock()?.profile.clone())
    }

    pub fn status(&self) -> Result<EngineStatus, PressureError> {
        let today = self.today();
        let state = self.lock()?;
        let events = state.events.events();

        Ok(EngineStatus {
            day: state.events.day(&self.calendar, today),
            today_count: events.len(),
            level: PressureLevel::from_count(events.len()),
            stress_density: compute_stress_density(events),
            peak_window: compute_peak_window(events, &self.calendar),
            phase: state.phase,
            profile: state.profile.clone(),
        })
    }

    // -- settlement -------------------------------------------------------

    /// Settle the buffer's day, closing today when the buffer is empty.
    ///
    /// Runs the whole transaction under the engine lock, then spawns the
    /// analysis. The returned report is final; the analysis handle only
    /// tells when the enrichment has landed.
    pub async fn settle(&self) -> Result<Settlement, PressureError> {
        self.settle_closing(self.today()).await
    }

    /// Settle the buffer's day, closing `closing` when the buffer is empty.
    ///
    /// The scheduler uses this to close the day that has just ended rather
    /// than the one its slot falls in.
    pub async fn settle_closing(&self, closing: NaiveDate) -> Result<Settlement, PressureError> {
        let report = {
            let mut state = self.lock()?;
            state.phase = SettlementPhase::Settling;

            let outcome = settle_day(
                &state.events,
                &state.records,
                &state.profile,
                &self.calendar,
                closing,
            );
            let committed = self.commit_settlement(&mut state, outcome);

            state.phase = match &committed {
                Ok(report) => SettlementPhase::Settled { day: report.day },
                Err(_) => SettlementPhase::Pending,
            };
            committed?
        };

        info!(
            day = %report.day,
            click_count = report.record.click_count,
            level = %report.record.pressure_level,
            streak = report.current_streak,
            resettled = report.resettled,
            "day settled"
        );

        let analysis = self.spawn_analysis(report.record.clone());
        Ok(Settlement { report, analysis })
    }

    /// Persist records then profile, committing each to memory once durable
    fn commit_settlement(
        &self,
        state: &mut EngineState,
        outcome: SettlementOutcome,
    ) -> Result<SettlementReport, PressureError> {
        save_json(self.store.as_ref(), RECORDS_KEY, &outcome.records)?;
        state.records = outcome.records;

        save_json(self.store.as_ref(), PROFILE_KEY, &outcome.profile)?;
        state.profile = outcome.profile;

        state.events.clear();
        if let Err(err) = save_json(self.store.as_ref(), TODAY_CLICKS_KEY, &state.events) {
            // The stale buffer re-settles into the same day on reload
            warn!(error = %err, "failed to persist cleared buffer");
        }

        Ok(outcome.report)
    }

    fn spawn_analysis(&self, record: PressureRecord) -> JoinHandle<AnalysisSource> {
        let engine = self.clone();
        tokio::spawn(async move {
            let (analysis, source) = engine.analysis.analyze_or_fallback(&record).await;
            if let Err(err) = engine.attach_analysis(record.id, analysis) {
                warn!(day = %record.date, error = %err, "failed to attach analysis");
            }
            source
        })
    }

    fn attach_analysis(&self, id: Uuid, analysis: AiAnalysis) -> Result<(), PressureError> {
        let mut state = self.lock()?;
        if !state.records.attach_analysis(id, analysis) {
            debug!(%id, "record vanished before analysis landed");
            return Ok(());
        }
        save_json(self.store.as_ref(), RECORDS_KEY, &state.records)
    }

    // -- record maintenance -----------------------------------------------

    /// Replace the notes on `day`'s record; blank notes clear them
    pub fn set_notes(
        &self,
        day: NaiveDate,
        notes: Option<String>,
    ) -> Result<PressureRecord, PressureError> {
        let mut state = self.lock()?;
        let mut records = state.records.clone();
        records.set_notes(day, notes)?;
        save_json(self.store.as_ref(), RECORDS_KEY, &records)?;
        state.records = records;

        state
            .records
            .get(day)
            .cloned()
            .ok_or(PressureError::UnknownRecord(day))
    }

    /// Analyse `day`'s record on demand, optionally replacing its notes first
    pub async fn analyze_day(
        &self,
        day: NaiveDate,
        notes: Option<String>,
    ) -> Result<(AiAnalysis, AnalysisSource), PressureError> {
        let record = match notes {
            Some(notes) => self.set_notes(day, Some(notes))?,
            None => self.record(day)?.ok_or(PressureError::UnknownRecord(day))?,
        };

        let (analysis, source) = self.analysis.analyze_or_fallback(&record).await;
        self.attach_analysis(record.id, analysis.clone())?;
        Ok((analysis, source))
    }

    /// Mark that the user has backed up their résumé
    pub fn record_resume_backup(&self) -> Result<UserProfile, PressureError> {
        let now = self.clock.now();
        let mut state = self.lock()?;
        let mut profile = state.profile.clone();
        profile.has_resume_backup = true;
        profile.resume_backup_date = Some(now);
        save_json(self.store.as_ref(), PROFILE_KEY, &profile)?;
        state.profile = profile.clone();
        Ok(profile)
    }

    /// One-sentence guess at what caused a burst of taps
    pub async fn proactive_attribution(&self) -> Result<String, PressureError> {
        let (count, peak) = {
            let state = self.lock()?;
            let events = state.events.events();
            (events.len(), compute_peak_window(events, &self.calendar))
        };
        Ok(self.analysis.proactive_attribution(count, peak).await)
    }

    // -- queries ----------------------------------------------------------

    pub fn record(&self, day: NaiveDate) -> Result<Option<PressureRecord>, PressureError> {
        Ok(self.lock()?.records.get(day).cloned())
    }

    /// Records from the last `days` days up to today, newest first
    pub fn recent_records(&self, days: u32) -> Result<Vec<PressureRecord>, PressureError> {
        let today = self.today();
        Ok(self.lock()?.records.recent(today, days))
    }

    pub fn monthly_records(
        &self,
        year: i32,
        month: u32,
    ) -> Result<Vec<PressureRecord>, PressureError> {
        self.lock()?.records.monthly(year, month)
    }

    pub fn quarterly_records(
        &self,
        year: i32,
        quarter: u32,
    ) -> Result<Vec<PressureRecord>, PressureError> {
        self.lock()?.records.quarterly(year, quarter)
    }

    pub fn yearly_records(&self, year: i32) -> Result<Vec<PressureRecord>, PressureError> {
        Ok(self.lock()?.records.yearly(year))
    }
}

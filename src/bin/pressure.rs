//! Pressure CLI - Command-line interface for Pressure Flux
//!
//! Commands:
//! - tap: Record one or more taps
//! - status: Live counters for the current buffer
//! - settle: Settle the buffer's day now
//! - history: Query settled records
//! - notes / analyze: Annotate and analyse a settled day
//! - achievements: Achievement catalogue and unlock state
//! - backup: Mark the résumé as backed up
//! - daemon: Run the daily settlement scheduler
//! - doctor: Diagnose configuration and storage

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde_json::json;
use std::io;
use std::process::ExitCode;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use pressure_flux::store::Snapshot;
use pressure_flux::{
    run_settlement_scheduler, Achievement, AnalysisSource, EngineConfig, FileStore, PressureEngine,
    PressureError, RapidTap, RapidTapTracker, FLUX_VERSION, PRODUCER_NAME,
};

/// Pressure - tap aggregation and daily settlement
#[derive(Parser)]
#[command(name = "pressure")]
#[command(version = FLUX_VERSION)]
#[command(about = "Aggregate stress taps and settle them into daily records", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record taps
    Tap {
        /// Number of taps to record
        #[arg(short, long, default_value = "1")]
        count: u32,
    },

    /// Print live counters for the current buffer
    Status,

    /// Settle the buffer's day and wait for its analysis
    Settle,

    /// Query settled records
    History {
        #[command(subcommand)]
        range: HistoryRange,
    },

    /// Set or clear the notes on a settled day (YYYY-MM-DD)
    Notes {
        day: String,
        /// Notes text; empty clears them
        text: String,
    },

    /// Analyse a settled day (YYYY-MM-DD)
    Analyze {
        day: String,

        /// Replace the day's notes before analysing
        #[arg(long)]
        notes: Option<String>,
    },

    /// List achievements and which are unlocked
    Achievements,

    /// Mark the résumé as backed up
    Backup,

    /// Run the daily settlement scheduler until interrupted
    Daemon {
        /// Local settlement hour (overrides PRESSURE_SETTLEMENT_HOUR)
        #[arg(long)]
        hour: Option<u32>,
    },

    /// Diagnose configuration and storage
    Doctor {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum HistoryRange {
    /// Records from the last N days, newest first
    Recent {
        #[arg(long, default_value = "7")]
        days: u32,
    },
    /// Records of one month
    Month { year: i32, month: u32 },
    /// Records of one quarter (1-4)
    Quarter { year: i32, quarter: u32 },
    /// Records of one year
    Year { year: i32 },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), PressureCliError> {
    let config = EngineConfig::from_env()?;

    if let Commands::Doctor { json } = cli.command {
        return cmd_doctor(&config, json);
    }

    let engine = PressureEngine::open(&config)?;

    match cli.command {
        Commands::Tap { count } => cmd_tap(&engine, count).await,
        Commands::Status => print_json(&engine.status()?),
        Commands::Settle => cmd_settle(&engine).await,
        Commands::History { range } => cmd_history(&engine, range),
        Commands::Notes { day, text } => {
            let record = engine.set_notes(parse_day(&day)?, Some(text))?;
            print_json(&record)
        }
        Commands::Analyze { day, notes } => {
            let (analysis, source) = engine.analyze_day(parse_day(&day)?, notes).await?;
            print_json(&json!({
                "analysis": analysis,
                "fallback": source == AnalysisSource::Fallback,
            }))
        }
        Commands::Achievements => cmd_achievements(&engine),
        Commands::Backup => print_json(&engine.record_resume_backup()?),
        Commands::Daemon { hour } => cmd_daemon(engine, hour.unwrap_or(config.settlement_hour)).await,
        Commands::Doctor { .. } => Ok(()),
    }
}

async fn cmd_tap(engine: &PressureEngine, count: u32) -> Result<(), PressureCliError> {
    let mut tracker = RapidTapTracker::new();
    let mut last = None;
    let mut trips = 0usize;
    let mut persist_error = None;
    let mut unlocked = Vec::new();
    let mut attribution = None;

    for _ in 0..count {
        let outcome = engine.add_event()?;
        if outcome.breaker.is_some() {
            trips += 1;
        }
        unlocked.extend(outcome.unlocked.iter().copied());
        if outcome.persist_error.is_some() {
            persist_error = outcome.persist_error.clone();
        }
        if tracker.record(outcome.event.timestamp) == RapidTap::ProactiveTrigger {
            attribution = Some(engine.proactive_attribution().await?);
        }
        last = Some(outcome);
    }

    print_json(&json!({
        "taps": count,
        "todayCount": engine.today_count()?,
        "breakerTrips": trips,
        "lastTrip": last.and_then(|o| o.breaker),
        "unlocked": unlocked,
        "attribution": attribution,
        "persistError": persist_error,
    }))
}

async fn cmd_settle(engine: &PressureEngine) -> Result<(), PressureCliError> {
    let settlement = engine.settle().await?;
    let day = settlement.report.day;
    let source = settlement.analysis.await.ok();

    print_json(&json!({
        "report": settlement.report,
        "record": engine.record(day)?,
        "fallback": source.map(|s| s == AnalysisSource::Fallback),
    }))
}

fn cmd_history(engine: &PressureEngine, range: HistoryRange) -> Result<(), PressureCliError> {
    let records = match range {
        HistoryRange::Recent { days } => engine.recent_records(days)?,
        HistoryRange::Month { year, month } => engine.monthly_records(year, month)?,
        HistoryRange::Quarter { year, quarter } => engine.quarterly_records(year, quarter)?,
        HistoryRange::Year { year } => engine.yearly_records(year)?,
    };
    print_json(&records)
}

fn cmd_achievements(engine: &PressureEngine) -> Result<(), PressureCliError> {
    let profile = engine.profile()?;
    let catalogue: Vec<serde_json::Value> = Achievement::ALL
        .iter()
        .map(|a| {
            json!({
                "id": a,
                "title": a.title(),
                "description": a.description(),
                "unlocked": profile.has_achievement(*a),
            })
        })
        .collect();
    print_json(&catalogue)
}

async fn cmd_daemon(engine: PressureEngine, hour: u32) -> Result<(), PressureCliError> {
    if hour > 23 {
        return Err(PressureError::ConfigError(format!("settlement hour {hour} is not 0-23")).into());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = tokio::spawn(run_settlement_scheduler(engine, hour, shutdown_rx));

    tokio::signal::ctrl_c().await?;
    tracing::info!("interrupt received, stopping scheduler");
    // The receiver only disappears once the scheduler has exited
    let _ = shutdown_tx.send(true);
    scheduler
        .await
        .map_err(|e| PressureCliError::Io(io::Error::new(io::ErrorKind::Other, e)))?;
    Ok(())
}

fn cmd_doctor(config: &EngineConfig, json: bool) -> Result<(), PressureCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "version".to_string(),
        status: CheckStatus::Ok,
        message: format!("{} {}", PRODUCER_NAME, FLUX_VERSION),
    });

    checks.push(DoctorCheck {
        name: "calendar".to_string(),
        status: CheckStatus::Ok,
        message: format!(
            "UTC offset {} minutes, settlement at {:02}:00",
            config.utc_offset_minutes, config.settlement_hour
        ),
    });

    // Storage: the directory must open and every aggregate must decode
    match FileStore::open(&config.data_dir) {
        Ok(store) => match Snapshot::load(&store) {
            Ok(snapshot) => checks.push(DoctorCheck {
                name: "storage".to_string(),
                status: CheckStatus::Ok,
                message: format!(
                    "{} ({} buffered taps, {} records)",
                    store.dir().display(),
                    snapshot.events.len(),
                    snapshot.records.len()
                ),
            }),
            Err(e) => checks.push(DoctorCheck {
                name: "storage".to_string(),
                status: CheckStatus::Error,
                message: e.to_string(),
            }),
        },
        Err(e) => checks.push(DoctorCheck {
            name: "storage".to_string(),
            status: CheckStatus::Error,
            message: format!("Cannot open {}: {}", config.data_dir.display(), e),
        }),
    }

    checks.push(if config.analysis.api_key.is_some() {
        DoctorCheck {
            name: "analysis".to_string(),
            status: CheckStatus::Ok,
            message: format!("{} via {}", config.analysis.model, config.analysis.base_url),
        }
    } else {
        DoctorCheck {
            name: "analysis".to_string(),
            status: CheckStatus::Warning,
            message: "PRESSURE_ANALYSIS_API_KEY unset, local fallback only".to_string(),
        }
    });

    checks.push(DoctorCheck {
        name: "stdout".to_string(),
        status: CheckStatus::Ok,
        message: if atty::is(atty::Stream::Stdout) {
            "stdout is a TTY".to_string()
        } else {
            "stdout is a pipe (JSON output ready)".to_string()
        },
    });

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: FLUX_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Pressure Doctor Report");
        println!("======================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report.checks.iter().any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(PressureCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn parse_day(raw: &str) -> Result<NaiveDate, PressureCliError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| PressureCliError::InvalidDay(raw.to_string()))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), PressureCliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// Error types

#[derive(Debug)]
enum PressureCliError {
    Engine(PressureError),
    Io(io::Error),
    Json(serde_json::Error),
    InvalidDay(String),
    DoctorFailed,
}

impl From<PressureError> for PressureCliError {
    fn from(e: PressureError) -> Self {
        PressureCliError::Engine(e)
    }
}

impl From<io::Error> for PressureCliError {
    fn from(e: io::Error) -> Self {
        PressureCliError::Io(e)
    }
}

impl From<serde_json::Error> for PressureCliError {
    fn from(e: serde_json::Error) -> Self {
        PressureCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<PressureCliError> for CliError {
    fn from(e: PressureCliError) -> Self {
        match e {
            PressureCliError::Engine(e) => {
                let (code, hint) = match &e {
                    PressureError::Persistence { .. } => {
                        ("PERSISTENCE_ERROR", "Run 'pressure doctor' to check the data directory")
                    }
                    PressureError::ConfigError(_) => {
                        ("CONFIG_ERROR", "Check the PRESSURE_* environment variables")
                    }
                    PressureError::UnknownRecord(_) => {
                        ("UNKNOWN_RECORD", "Only settled days have records; see 'pressure history'")
                    }
                    PressureError::InvalidQuery(_) => {
                        ("INVALID_QUERY", "Months are 1-12 and quarters 1-4")
                    }
                    _ => ("ENGINE_ERROR", "Retry; the in-memory state was not lost"),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            PressureCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            PressureCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
            PressureCliError::InvalidDay(raw) => CliError {
                code: "INVALID_DAY".to_string(),
                message: format!("'{}' is not a date", raw),
                hint: Some("Use YYYY-MM-DD".to_string()),
            },
            PressureCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}

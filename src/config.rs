//! Engine configuration from environment variables

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::breaker::BreakerConfig;
use crate::calendar::LocalCalendar;
use crate::error::PressureError;

/// Default local hour at which the daily settlement fires
pub const DEFAULT_SETTLEMENT_HOUR: u32 = 3;

/// Settings for the external analysis service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Bearer token; `None` makes every call fail with a missing credential
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.deepseek.com/v1".to_string(),
            model: "deepseek-chat".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Configuration for the pressure engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Directory holding the JSON key-value store
    pub data_dir: PathBuf,

    /// Minutes east of UTC used for day boundaries and windows
    pub utc_offset_minutes: i32,

    /// Local hour of the daily settlement
    pub settlement_hour: u32,

    pub breaker: BreakerConfig,

    pub analysis: AnalysisConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./pressure-data"),
            utc_offset_minutes: 0,
            settlement_hour: DEFAULT_SETTLEMENT_HOUR,
            breaker: BreakerConfig::default(),
            analysis: AnalysisConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `PRESSURE_DATA_DIR` (default: ./pressure-data)
    /// - `PRESSURE_UTC_OFFSET_MINUTES` (default: 0)
    /// - `PRESSURE_SETTLEMENT_HOUR` (default: 3)
    /// - `PRESSURE_BURST_EVENTS` (default: 1000)
    /// - `PRESSURE_BURST_WINDOW_SECS` (default: 300)
    /// - `PRESSURE_ANALYSIS_API_KEY` (default: unset)
    /// - `PRESSURE_ANALYSIS_BASE_URL` (default: https://api.deepseek.com/v1)
    /// - `PRESSURE_ANALYSIS_MODEL` (default: deepseek-chat)
    /// - `PRESSURE_ANALYSIS_TIMEOUT_SECS` (default: 30)
    pub fn from_env() -> Result<Self, PressureError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, PressureError> {
        let defaults = Self::default();

        let config = Self {
            data_dir: lookup("PRESSURE_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),

            utc_offset_minutes: parse_var(&lookup, "PRESSURE_UTC_OFFSET_MINUTES")?
                .unwrap_or(defaults.utc_offset_minutes),

            settlement_hour: parse_var(&lookup, "PRESSURE_SETTLEMENT_HOUR")?
                .unwrap_or(defaults.settlement_hour),

            breaker: BreakerConfig {
                burst_events: parse_var(&lookup, "PRESSURE_BURST_EVENTS")?
                    .unwrap_or(defaults.breaker.burst_events),
                burst_window_secs: parse_var(&lookup, "PRESSURE_BURST_WINDOW_SECS")?
                    .unwrap_or(defaults.breaker.burst_window_secs),
            },

            analysis: AnalysisConfig {
                api_key: lookup("PRESSURE_ANALYSIS_API_KEY").filter(|k| !k.is_empty()),
                base_url: lookup("PRESSURE_ANALYSIS_BASE_URL")
                    .unwrap_or(defaults.analysis.base_url),
                model: lookup("PRESSURE_ANALYSIS_MODEL").unwrap_or(defaults.analysis.model),
                timeout_secs: parse_var(&lookup, "PRESSURE_ANALYSIS_TIMEOUT_SECS")?
                    .unwrap_or(defaults.analysis.timeout_secs),
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), PressureError> {
        if self.settlement_hour > 23 {
            return Err(PressureError::ConfigError(format!(
                "settlement hour {} is not 0-23",
                self.settlement_hour
            )));
        }
        if self.analysis.timeout_secs == 0 {
            return Err(PressureError::ConfigError(
                "analysis timeout must be positive".to_string(),
            ));
        }
        self.calendar()?;
        Ok(())
    }

    pub fn calendar(&self) -> Result<LocalCalendar, PressureError> {
        LocalCalendar::with_offset_minutes(self.utc_offset_minutes)
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, PressureError> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw.trim().parse().map(Some).map_err(|_| {
            PressureError::ConfigError(format!("{key}: cannot parse '{raw}'"))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = EngineConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.breaker.burst_events, 1000);
        assert_eq!(config.breaker.burst_window_secs, 300);
    }

    #[test]
    fn test_overrides() {
        let config = EngineConfig::from_lookup(lookup(&[
            ("PRESSURE_DATA_DIR", "/tmp/pressure"),
            ("PRESSURE_UTC_OFFSET_MINUTES", "480"),
            ("PRESSURE_SETTLEMENT_HOUR", "4"),
            ("PRESSURE_ANALYSIS_API_KEY", "sk-test"),
            ("PRESSURE_ANALYSIS_TIMEOUT_SECS", "5"),
        ]))
        .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/tmp/pressure"));
        assert_eq!(config.utc_offset_minutes, 480);
        assert_eq!(config.settlement_hour, 4);
        assert_eq!(config.analysis.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.analysis.timeout_secs, 5);
    }

    #[test]
    fn test_empty_api_key_is_unset() {
        let config =
            EngineConfig::from_lookup(lookup(&[("PRESSURE_ANALYSIS_API_KEY", "")])).unwrap();
        assert!(config.analysis.api_key.is_none());
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(EngineConfig::from_lookup(lookup(&[("PRESSURE_SETTLEMENT_HOUR", "25")])).is_err());
        assert!(EngineConfig::from_lookup(lookup(&[("PRESSURE_BURST_EVENTS", "many")])).is_err());
        assert!(
            EngineConfig::from_lookup(lookup(&[("PRESSURE_UTC_OFFSET_MINUTES", "2000")])).is_err()
        );
    }
}

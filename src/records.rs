//! Historical pressure records
//!
//! The record set holds at most one [`PressureRecord`] per calendar day.
//! Settlement goes through [`RecordSet::upsert_day`], which finds or creates
//! by day and never duplicates. Query helpers are pure filters.

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PressureError;
use crate::metrics::DailyMetrics;
use crate::types::{AiAnalysis, PressureRecord};

/// Ordered collection of daily records
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<PressureRecord>", into = "Vec<PressureRecord>")]
pub struct RecordSet {
    records: Vec<PressureRecord>,
}

impl From<Vec<PressureRecord>> for RecordSet {
    fn from(records: Vec<PressureRecord>) -> Self {
        Self::from_records(records)
    }
}

impl From<RecordSet> for Vec<PressureRecord> {
    fn from(set: RecordSet) -> Self {
        set.records
    }
}

impl RecordSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from persisted records. Later duplicates of a day are dropped.
    pub fn from_records(records: Vec<PressureRecord>) -> Self {
        let mut set = Self::new();
        for record in records {
            if set.get(record.date).is_none() {
                set.records.push(record);
            }
        }
        set
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PressureRecord> {
        self.records.iter()
    }

    pub fn get(&self, day: NaiveDate) -> Option<&PressureRecord> {
        self.records.iter().find(|r| r.date == day)
    }

    fn get_mut(&mut self, day: NaiveDate) -> Option<&mut PressureRecord> {
        self.records.iter_mut().find(|r| r.date == day)
    }

    /// Find or create the record for `day` and write `metrics` into it
    pub fn upsert_day(&mut self, day: NaiveDate, metrics: &DailyMetrics) -> &PressureRecord {
        let index = match self.records.iter().position(|r| r.date == day) {
            Some(index) => index,
            None => {
                self.records.push(PressureRecord::new(day));
                self.records.len() - 1
            }
        };

        let record = &mut self.records[index];
        record.set_click_count(metrics.click_count);
        record.stress_density = metrics.stress_density;
        record.peak_time = metrics.peak_window;
        record
    }

    /// Attach an analysis to the record with `id`
    pub fn attach_analysis(&mut self, id: Uuid, analysis: AiAnalysis) -> bool {
        match self.records.iter_mut().find(|r| r.id == id) {
            Some(record) => {
                record.ai_analysis = Some(analysis);
                true
            }
            None => false,
        }
    }

    /// Set or clear the notes of the record for `day`
    pub fn set_notes(&mut self, day: NaiveDate, notes: Option<String>) -> Result<(), PressureError> {
        let record = self.get_mut(day).ok_or(PressureError::UnknownRecord(day))?;
        record.user_notes = notes.filter(|n| !n.trim().is_empty());
        Ok(())
    }

    /// Records from the `days` calendar days ending on `today`, newest first
    pub fn recent(&self, today: NaiveDate, days: u32) -> Vec<PressureRecord> {
        if days == 0 {
            return Vec::new();
        }
        let start = today - Duration::days(i64::from(days) - 1);
        let mut records: Vec<PressureRecord> = self
            .records
            .iter()
            .filter(|r| r.date >= start && r.date <= today)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.date.cmp(&a.date));
        records
    }

    /// Records in `month` (1-12) of `year`, oldest first
    pub fn monthly(&self, year: i32, month: u32) -> Result<Vec<PressureRecord>, PressureError> {
        if !(1..=12).contains(&month) {
            return Err(PressureError::InvalidQuery(format!("month {month} is not 1-12")));
        }
        Ok(self.filter_sorted(|d| d.year() == year && d.month() == month))
    }

    /// Records in `quarter` (1-4) of `year`, oldest first
    pub fn quarterly(&self, year: i32, quarter: u32) -> Result<Vec<PressureRecord>, PressureError> {
        if !(1..=4).contains(&quarter) {
            return Err(PressureError::InvalidQuery(format!("quarter {quarter} is not 1-4")));
        }
        let first_month = (quarter - 1) * 3 + 1;
        let last_month = quarter * 3;
        Ok(self.filter_sorted(|d| {
            d.year() == year && d.month() >= first_month && d.month() <= last_month
        }))
    }

    /// Records in `year`, oldest first
    pub fn yearly(&self, year: i32) -> Vec<PressureRecord> {
        self.filter_sorted(|d| d.year() == year)
    }

    fn filter_sorted(&self, keep: impl Fn(NaiveDate) -> bool) -> Vec<PressureRecord> {
        let mut records: Vec<PressureRecord> = self
            .records
            .iter()
            .filter(|r| keep(r.date))
            .cloned()
            .collect();
        records.sort_by_key(|r| r.date);
        records
    }
}

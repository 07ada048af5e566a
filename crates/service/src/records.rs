//! Client-side views over fetched attendance records.
//!
//! Everything here is pure: the backend owns the canonical data, these
//! functions only shape what was fetched for display or export.

use std::collections::HashSet;

use chrono::{NaiveDate, NaiveDateTime};
use thiserror::Error;

use crate::api::AttendanceRecord;

#[derive(Debug, Error)]
pub enum RecordsError {
    #[error("csv export failed: {0}")]
    Csv(String),
}

/// Name search plus optional day filter, as used by the management table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    pub search: Option<String>,
    pub date: Option<NaiveDate>,
}

impl RecordFilter {
    pub fn new() -> Self { Self::default() }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn on_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    pub fn clear(&mut self) {
        self.search = None;
        self.date = None;
    }

    fn needle(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
    }

    pub fn is_empty(&self) -> bool {
        self.needle().is_none() && self.date.is_none()
    }

    pub fn matches(&self, record: &AttendanceRecord) -> bool {
        let name_ok = self
            .needle()
            .map_or(true, |needle| record.name.to_lowercase().contains(&needle));
        let date_ok = self.date.map_or(true, |d| record.timestamp.date() == d);
        name_ok && date_ok
    }

    /// Matching records, newest first.
    pub fn apply(&self, records: &[AttendanceRecord]) -> Vec<AttendanceRecord> {
        let mut out: Vec<AttendanceRecord> = records.iter().filter(|r| self.matches(r)).cloned().collect();
        sort_newest_first(&mut out);
        out
    }
}

/// Newest check-in first; equal timestamps fall back to descending id.
pub fn sort_newest_first(records: &mut [AttendanceRecord]) {
    records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| b.id.cmp(&a.id)));
}

/// Most recent check-in, i.e. the "latest recognition" on the live view.
pub fn latest(records: &[AttendanceRecord]) -> Option<&AttendanceRecord> {
    records.iter().max_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)))
}

/// CSV with header `Id,Name,Date,Time`, rows in the given order.
pub fn export_csv(records: &[AttendanceRecord]) -> Result<String, RecordsError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(["Id", "Name", "Date", "Time"])
        .map_err(|e| RecordsError::Csv(e.to_string()))?;
    for r in records {
        writer
            .write_record([
                r.id.to_string(),
                r.name.clone(),
                r.timestamp.format("%Y-%m-%d").to_string(),
                r.timestamp.format("%H:%M:%S").to_string(),
            ])
            .map_err(|e| RecordsError::Csv(e.to_string()))?;
    }
    let bytes = writer.into_inner().map_err(|e| RecordsError::Csv(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| RecordsError::Csv(e.to_string()))
}

pub fn export_file_name(date: NaiveDate) -> String {
    format!("attendance-{}.csv", date.format("%Y-%m-%d"))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttendanceSummary {
    pub total: usize,
    /// Distinct names, compared case-insensitively after trimming.
    pub unique_students: usize,
    pub first_check_in: Option<NaiveDateTime>,
    pub latest_check_in: Option<NaiveDateTime>,
}

pub fn summarize(records: &[AttendanceRecord]) -> AttendanceSummary {
    let unique: HashSet<String> = records.iter().map(|r| r.name.trim().to_lowercase()).collect();
    AttendanceSummary {
        total: records.len(),
        unique_students: unique.len(),
        first_check_in: records.iter().map(|r| r.timestamp).min(),
        latest_check_in: records.iter().map(|r| r.timestamp).max(),
    }
}

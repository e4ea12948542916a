use std::collections::HashSet;
use std::path::PathBuf;

use chrono::NaiveDateTime;
use kpi_config::InvalidRowPolicy;
use kpi_core::{TicketRecord, round_tenths};
use thiserror::Error;

mod row;
mod source;
mod sqlite;

pub use row::{CellValue, RawTicketRow, parse_created};
pub use source::{
    JsonLinesTicketSource, JsonTicketSource, TicketSource, detect_format, open_source,
};
pub use sqlite::SqliteTicketSource;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid JSON ticket export: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid JSON on line {line}: {source}")]
    JsonLine {
        line: usize,
        source: serde_json::Error,
    },
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("ticket source {} does not exist", path.display())]
    SourceMissing { path: PathBuf },
    #[error("cannot infer ticket source format for {}; use json, jsonl or sqlite", path.display())]
    UnsupportedFormat { path: PathBuf },
    #[error("invalid sqlite table name '{table}'")]
    InvalidTable { table: String },
    #[error("ticket table has no '{column}' column")]
    MissingColumn { column: String },
    #[error("row {row}: required field '{field}' is missing")]
    MissingField { row: usize, field: &'static str },
    #[error("row {row}: cannot parse Created timestamp '{value}'")]
    InvalidTimestamp { row: usize, value: String },
    #[error("row {row}: Total Hrs '{value}' is not a non-negative number")]
    InvalidHours { row: usize, value: String },
}

impl StoreError {
    /// Row-level faults that the skip policy may drop; everything else is
    /// structural and always fails the load.
    pub fn is_row_fault(&self) -> bool {
        matches!(
            self,
            Self::MissingField { .. } | Self::InvalidTimestamp { .. } | Self::InvalidHours { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRow {
    pub row: usize,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub source: String,
    pub rows_read: usize,
    pub loaded: usize,
    pub skipped: Vec<SkippedRow>,
    pub duplicate_keys: Vec<String>,
}

/// The immutable, in-memory ticket table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordStore {
    records: Vec<TicketRecord>,
}

impl RecordStore {
    /// Builds a store from already-typed records. Hours are re-rounded to
    /// tenths so the store never holds finer values.
    pub fn from_records(records: Vec<TicketRecord>) -> Self {
        let records = records
            .into_iter()
            .map(|mut record| {
                record.total_hours = record.total_hours.map(round_tenths);
                record
            })
            .collect();
        Self { records }
    }

    pub fn load(
        source: &dyn TicketSource,
        policy: InvalidRowPolicy,
    ) -> Result<(Self, LoadReport), StoreError> {
        let description = source.describe();
        let rows = source.load_rows()?;
        let rows_read = rows.len();

        let mut records = Vec::with_capacity(rows_read);
        let mut skipped = Vec::new();
        for (index, raw) in rows.into_iter().enumerate() {
            let row = index + 1;
            match raw.into_record(row) {
                Ok(record) => records.push(record),
                Err(err) if err.is_row_fault() && policy == InvalidRowPolicy::Skip => {
                    tracing::warn!(
                        source = %description,
                        row,
                        error = %err,
                        "skipping invalid ticket row"
                    );
                    skipped.push(SkippedRow {
                        row,
                        reason: err.to_string(),
                    });
                }
                Err(err) => return Err(err),
            }
        }

        let duplicate_keys = duplicate_keys(&records);
        if !duplicate_keys.is_empty() {
            tracing::warn!(
                source = %description,
                duplicates = duplicate_keys.len(),
                "ticket export contains repeated keys"
            );
        }

        tracing::info!(
            source = %description,
            rows_read,
            loaded = records.len(),
            skipped = skipped.len(),
            "loaded ticket table"
        );

        let report = LoadReport {
            source: description,
            rows_read,
            loaded: records.len(),
            skipped,
            duplicate_keys,
        };
        Ok((Self { records }, report))
    }

    pub fn records(&self) -> &[TicketRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn latest_created(&self) -> Option<NaiveDateTime> {
        self.records.iter().map(|record| record.created).max()
    }

    /// Distinct root causes in first-seen order, absent values excluded.
    pub fn root_cause_options(&self) -> Vec<String> {
        distinct_in_order(self.records.iter().filter_map(TicketRecord::root_cause))
    }

    /// Distinct assignees in first-seen order, absent values excluded.
    pub fn assignee_options(&self) -> Vec<String> {
        distinct_in_order(self.records.iter().filter_map(TicketRecord::assignee))
    }
}

fn distinct_in_order<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .filter(|value| seen.insert(*value))
        .map(str::to_owned)
        .collect()
}

fn duplicate_keys(records: &[TicketRecord]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut reported = HashSet::new();
    records
        .iter()
        .map(|record| record.key.as_str())
        .filter(|key| !seen.insert(*key) && reported.insert(*key))
        .map(str::to_owned)
        .collect()
}

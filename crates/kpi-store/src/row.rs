use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta};
use kpi_core::{
    COLUMN_ASSIGNEE, COLUMN_CREATED, COLUMN_CUSTOMER_REQUEST_TYPE, COLUMN_KEY, COLUMN_ROOT_CAUSE,
    COLUMN_SUMMARY, COLUMN_TOTAL_HOURS, REQUIRED_COLUMNS, TicketRecord, normalize_optional_text,
    round_tenths,
};
use serde::Deserialize;

use crate::StoreError;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%d/%b/%y %I:%M %p",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%d/%b/%y"];

// Integers at or above this are unix seconds (2001-09-09 onwards).
const MIN_EPOCH_SECONDS: i64 = 1_000_000_000;
// Spreadsheet serial for 9999-12-31.
const MAX_SPREADSHEET_SERIAL: f64 = 2_958_465.0;
const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// A single spreadsheet cell as it arrives from a source.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Text(String),
    Integer(i64),
    Real(f64),
    /// Booleans, arrays and objects; rejected per row during validation.
    Other(serde_json::Value),
}

impl CellValue {
    fn into_text(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Integer(value) => value.to_string(),
            Self::Real(value) => value.to_string(),
            Self::Other(value) => value.to_string(),
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Integer(value) => value.to_string(),
            Self::Real(value) => value.to_string(),
            Self::Other(value) => value.to_string(),
        }
    }
}

/// Untyped ticket row keyed by the exported column headers.
///
/// Columns outside the fixed schema are ignored.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct RawTicketRow {
    #[serde(rename = "Key", default)]
    pub key: Option<CellValue>,
    #[serde(rename = "Summary", default)]
    pub summary: Option<CellValue>,
    #[serde(rename = "Assignee", default)]
    pub assignee: Option<CellValue>,
    #[serde(rename = "Customer Request Type", default)]
    pub customer_request_type: Option<CellValue>,
    #[serde(rename = "Created", default)]
    pub created: Option<CellValue>,
    #[serde(rename = "Root Cause for PBSD", default)]
    pub root_cause: Option<CellValue>,
    #[serde(rename = "Total Hrs", default)]
    pub total_hours: Option<CellValue>,
}

impl RawTicketRow {
    pub(crate) fn set_column(&mut self, column: &str, value: Option<CellValue>) {
        match column {
            COLUMN_KEY => self.key = value,
            COLUMN_SUMMARY => self.summary = value,
            COLUMN_ASSIGNEE => self.assignee = value,
            COLUMN_CUSTOMER_REQUEST_TYPE => self.customer_request_type = value,
            COLUMN_CREATED => self.created = value,
            COLUMN_ROOT_CAUSE => self.root_cause = value,
            COLUMN_TOTAL_HOURS => self.total_hours = value,
            _ => {}
        }
    }

    /// Validates the row and builds a typed record. `row` is 1-based.
    pub fn into_record(self, row: usize) -> Result<TicketRecord, StoreError> {
        let key = optional_text(self.key).ok_or(StoreError::MissingField {
            row,
            field: COLUMN_KEY,
        })?;
        let created = match self.created {
            None => {
                return Err(StoreError::MissingField {
                    row,
                    field: COLUMN_CREATED,
                });
            }
            Some(cell) => parse_created_cell(cell, row)?,
        };
        let total_hours = match self.total_hours {
            None => None,
            Some(cell) => parse_hours_cell(cell, row)?,
        };

        Ok(TicketRecord {
            key,
            summary: self
                .summary
                .map(|cell| cell.into_text().trim().to_owned())
                .unwrap_or_default(),
            assignee: optional_text(self.assignee),
            customer_request_type: optional_text(self.customer_request_type),
            created,
            root_cause: optional_text(self.root_cause),
            total_hours,
        })
    }
}

/// Parses the timestamp shapes seen in ticket exports.
///
/// Offset-carrying timestamps are normalized to UTC; date-only values map to
/// midnight.
pub fn parse_created(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.naive_utc());
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

/// Fails with the first required header that `has_column` does not know.
pub(crate) fn check_required_columns(
    has_column: impl Fn(&str) -> bool,
) -> Result<(), StoreError> {
    match REQUIRED_COLUMNS.iter().find(|column| !has_column(**column)) {
        Some(missing) => Err(StoreError::MissingColumn {
            column: (*missing).to_owned(),
        }),
        None => Ok(()),
    }
}

/// Numeric `Created` cells: large integers are unix seconds, smaller numbers
/// are spreadsheet serial days counted from 1899-12-30.
fn created_from_number(value: f64) -> Option<NaiveDateTime> {
    if value >= MIN_EPOCH_SECONDS as f64 && value.fract() == 0.0 {
        return DateTime::from_timestamp(value as i64, 0).map(|timestamp| timestamp.naive_utc());
    }
    if !(1.0..=MAX_SPREADSHEET_SERIAL).contains(&value) {
        return None;
    }

    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let millis = (value * MILLIS_PER_DAY).round() as i64;
    base.checked_add_signed(TimeDelta::milliseconds(millis))
}

fn optional_text(cell: Option<CellValue>) -> Option<String> {
    normalize_optional_text(cell.map(CellValue::into_text))
}

fn parse_created_cell(cell: CellValue, row: usize) -> Result<NaiveDateTime, StoreError> {
    let parsed = match &cell {
        CellValue::Text(text) if text.trim().is_empty() => {
            return Err(StoreError::MissingField {
                row,
                field: COLUMN_CREATED,
            });
        }
        CellValue::Text(text) => parse_created(text),
        CellValue::Integer(value) => created_from_number(*value as f64),
        CellValue::Real(value) => created_from_number(*value),
        CellValue::Other(_) => None,
    };

    parsed.ok_or_else(|| StoreError::InvalidTimestamp {
        row,
        value: cell.describe(),
    })
}

fn parse_hours_cell(cell: CellValue, row: usize) -> Result<Option<f64>, StoreError> {
    let hours = match &cell {
        CellValue::Text(text) if text.trim().is_empty() => return Ok(None),
        CellValue::Text(text) => text.trim().parse::<f64>().ok(),
        CellValue::Integer(value) => Some(*value as f64),
        CellValue::Real(value) => Some(*value),
        CellValue::Other(_) => None,
    };

    match hours {
        Some(hours) if hours.is_finite() && hours >= 0.0 => Ok(Some(round_tenths(hours))),
        _ => Err(StoreError::InvalidHours {
            row,
            value: cell.describe(),
        }),
    }
}

use std::collections::BTreeSet;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

pub type TicketKey = String;

pub const COLUMN_KEY: &str = "Key";
pub const COLUMN_SUMMARY: &str = "Summary";
pub const COLUMN_ASSIGNEE: &str = "Assignee";
pub const COLUMN_CUSTOMER_REQUEST_TYPE: &str = "Customer Request Type";
pub const COLUMN_CREATED: &str = "Created";
pub const COLUMN_ROOT_CAUSE: &str = "Root Cause for PBSD";
pub const COLUMN_TOTAL_HOURS: &str = "Total Hrs";

pub const REQUIRED_COLUMNS: [&str; 7] = [
    COLUMN_KEY,
    COLUMN_SUMMARY,
    COLUMN_ASSIGNEE,
    COLUMN_CUSTOMER_REQUEST_TYPE,
    COLUMN_CREATED,
    COLUMN_ROOT_CAUSE,
    COLUMN_TOTAL_HOURS,
];

/// One support ticket row, already typed and validated.
///
/// `total_hours` is rounded to tenths when the record is built, so every
/// consumer sees the same 0.1-precision value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketRecord {
    pub key: TicketKey,
    pub summary: String,
    pub assignee: Option<String>,
    pub customer_request_type: Option<String>,
    pub created: NaiveDateTime,
    pub root_cause: Option<String>,
    pub total_hours: Option<f64>,
}

impl TicketRecord {
    pub fn new(key: impl Into<TicketKey>, created: NaiveDateTime) -> Self {
        Self {
            key: key.into(),
            summary: String::new(),
            assignee: None,
            customer_request_type: None,
            created,
            root_cause: None,
            total_hours: None,
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    pub fn with_assignee(mut self, assignee: impl Into<String>) -> Self {
        self.assignee = normalize_optional_text(Some(assignee.into()));
        self
    }

    pub fn with_customer_request_type(mut self, request_type: impl Into<String>) -> Self {
        self.customer_request_type = normalize_optional_text(Some(request_type.into()));
        self
    }

    pub fn with_root_cause(mut self, root_cause: impl Into<String>) -> Self {
        self.root_cause = normalize_optional_text(Some(root_cause.into()));
        self
    }

    pub fn with_total_hours(mut self, hours: f64) -> Self {
        self.total_hours = Some(round_tenths(hours));
        self
    }

    pub fn assignee(&self) -> Option<&str> {
        self.assignee.as_deref()
    }

    pub fn root_cause(&self) -> Option<&str> {
        self.root_cause.as_deref()
    }
}

/// Trailing window anchored at the newest `created` timestamp in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RecencyWindow {
    #[default]
    Week,
    Fortnight,
    Month,
}

impl RecencyWindow {
    pub const ALL: [RecencyWindow; 3] = [Self::Week, Self::Fortnight, Self::Month];

    pub fn days(self) -> u32 {
        match self {
            Self::Week => 7,
            Self::Fortnight => 15,
            Self::Month => 30,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Week => "week",
            Self::Fortnight => "fortnight",
            Self::Month => "month",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Week => "7 Days",
            Self::Fortnight => "15 Days",
            Self::Month => "Last Month",
        }
    }
}

impl std::str::FromStr for RecencyWindow {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "7" | "7d" | "week" => Ok(Self::Week),
            "15" | "15d" | "fortnight" => Ok(Self::Fortnight),
            "30" | "30d" | "month" | "last-month" | "last_month" => Ok(Self::Month),
            other => Err(format!(
                "invalid window '{other}', expected one of: 7, 15, 30 (or week, fortnight, month)"
            )),
        }
    }
}

/// The fixed reporting views offered next to the ticket table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReportView {
    #[default]
    ResolutionTime,
    TicketsByRootCause,
    AverageHoursToResolve,
    TotalTicketsByRootCause,
}

impl ReportView {
    pub const ALL: [ReportView; 4] = [
        Self::ResolutionTime,
        Self::TicketsByRootCause,
        Self::AverageHoursToResolve,
        Self::TotalTicketsByRootCause,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ResolutionTime => "resolution-time",
            Self::TicketsByRootCause => "tickets-by-root-cause",
            Self::AverageHoursToResolve => "average-hours",
            Self::TotalTicketsByRootCause => "root-cause-totals",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::ResolutionTime => "Existing Resolution Time Graph",
            Self::TicketsByRootCause => "Tickets by Root Cause",
            Self::AverageHoursToResolve => "Average Hours to Resolve",
            Self::TotalTicketsByRootCause => "Total Tickets by Root Cause",
        }
    }
}

impl std::str::FromStr for ReportView {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|view| view.as_str() == normalized)
            .ok_or_else(|| {
                format!(
                    "invalid view '{}', expected one of: resolution-time, tickets-by-root-cause, average-hours, root-cause-totals",
                    value.trim()
                )
            })
    }
}

/// User-selected filter state. Empty whitelists place no restriction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct FilterCriteria {
    pub window: RecencyWindow,
    #[serde(default)]
    pub root_causes: BTreeSet<String>,
    #[serde(default)]
    pub assignees: BTreeSet<String>,
}

impl FilterCriteria {
    pub fn new(window: RecencyWindow) -> Self {
        Self {
            window,
            ..Self::default()
        }
    }

    pub fn with_root_causes<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.root_causes = normalize_whitelist(values);
        self
    }

    pub fn with_assignees<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.assignees = normalize_whitelist(values);
        self
    }

    pub fn has_categorical_filters(&self) -> bool {
        !self.root_causes.is_empty() || !self.assignees.is_empty()
    }
}

/// Rounds to one decimal place, ties to even (0.25 -> 0.2, 0.35 -> 0.4).
pub fn round_tenths(value: f64) -> f64 {
    (value * 10.0).round_ties_even() / 10.0
}

/// Trims optional text and maps blank values to `None`.
pub fn normalize_optional_text(input: Option<String>) -> Option<String> {
    input
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn normalize_whitelist<I, S>(values: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    values
        .into_iter()
        .filter_map(|value| normalize_optional_text(Some(value.into())))
        .collect()
}

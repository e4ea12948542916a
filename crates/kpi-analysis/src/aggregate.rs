use std::hash::Hash;

use indexmap::IndexMap;
use kpi_core::{ReportView, TicketRecord, round_tenths};
use serde::{Deserialize, Serialize};

use crate::filter::RecordSet;

/// Count, total and mean of `total_hours` over a non-empty record set.
///
/// Sum and mean skip records without hours; `count` does not. Values keep full
/// precision, the `display_*` accessors round to tenths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryAggregate {
    pub count: usize,
    pub hours_reported: usize,
    pub total_hours: f64,
    pub average_hours: Option<f64>,
}

impl SummaryAggregate {
    /// `None` means "no data"; the caller shows a notice instead of numbers.
    pub fn compute(records: &RecordSet<'_>) -> Option<Self> {
        if records.is_empty() {
            return None;
        }

        let mut hours = HoursAccumulator::default();
        for record in records.iter() {
            hours.push(record.total_hours);
        }

        Some(Self {
            count: hours.count,
            hours_reported: hours.hours_count,
            total_hours: hours.hours_sum,
            average_hours: hours.mean(),
        })
    }

    pub fn display_total(&self) -> f64 {
        round_tenths(self.total_hours)
    }

    pub fn display_average(&self) -> Option<f64> {
        self.average_hours.map(round_tenths)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketHoursRow {
    pub key: String,
    pub assignee: Option<String>,
    pub total_hours: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssigneeRootCauseCount {
    pub assignee: Option<String>,
    pub root_cause: Option<String>,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssigneeCount {
    pub assignee: Option<String>,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountByGroupTable {
    pub groups: Vec<AssigneeRootCauseCount>,
    pub assignee_totals: Vec<AssigneeCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssigneeRootCauseAverage {
    pub assignee: Option<String>,
    pub root_cause: Option<String>,
    pub average_hours: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssigneeAverage {
    pub assignee: Option<String>,
    pub average_hours: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AverageByGroupTable {
    pub groups: Vec<AssigneeRootCauseAverage>,
    pub assignee_averages: Vec<AssigneeAverage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootCauseCount {
    pub root_cause: Option<String>,
    pub count: usize,
}

/// Chart-ready output of one reporting view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "view", content = "data", rename_all = "snake_case")]
pub enum ViewTable {
    ResolutionTime(Vec<TicketHoursRow>),
    TicketsByRootCause(CountByGroupTable),
    AverageHoursToResolve(AverageByGroupTable),
    TotalTicketsByRootCause(Vec<RootCauseCount>),
}

impl ViewTable {
    pub fn view(&self) -> ReportView {
        match self {
            Self::ResolutionTime(_) => ReportView::ResolutionTime,
            Self::TicketsByRootCause(_) => ReportView::TicketsByRootCause,
            Self::AverageHoursToResolve(_) => ReportView::AverageHoursToResolve,
            Self::TotalTicketsByRootCause(_) => ReportView::TotalTicketsByRootCause,
        }
    }
}

pub fn build_view(view: ReportView, records: &RecordSet<'_>) -> ViewTable {
    match view {
        ReportView::ResolutionTime => ViewTable::ResolutionTime(per_ticket(records)),
        ReportView::TicketsByRootCause => ViewTable::TicketsByRootCause(count_by_group(records)),
        ReportView::AverageHoursToResolve => {
            ViewTable::AverageHoursToResolve(average_by_group(records))
        }
        ReportView::TotalTicketsByRootCause => {
            ViewTable::TotalTicketsByRootCause(count_by_root_cause(records))
        }
    }
}

pub fn per_ticket(records: &RecordSet<'_>) -> Vec<TicketHoursRow> {
    records
        .iter()
        .map(|record| TicketHoursRow {
            key: record.key.clone(),
            assignee: record.assignee.clone(),
            total_hours: record.total_hours,
        })
        .collect()
}

pub fn count_by_group(records: &RecordSet<'_>) -> CountByGroupTable {
    let groups = group_records(records, assignee_root_cause)
        .into_iter()
        .map(|((assignee, root_cause), hours)| AssigneeRootCauseCount {
            assignee: owned(assignee),
            root_cause: owned(root_cause),
            count: hours.count,
        })
        .collect();
    let assignee_totals = group_records(records, TicketRecord::assignee)
        .into_iter()
        .map(|(assignee, hours)| AssigneeCount {
            assignee: owned(assignee),
            count: hours.count,
        })
        .collect();

    CountByGroupTable {
        groups,
        assignee_totals,
    }
}

pub fn average_by_group(records: &RecordSet<'_>) -> AverageByGroupTable {
    let groups = group_records(records, assignee_root_cause)
        .into_iter()
        .map(|((assignee, root_cause), hours)| AssigneeRootCauseAverage {
            assignee: owned(assignee),
            root_cause: owned(root_cause),
            average_hours: hours.mean().map(round_tenths),
        })
        .collect();
    let assignee_averages = group_records(records, TicketRecord::assignee)
        .into_iter()
        .map(|(assignee, hours)| AssigneeAverage {
            assignee: owned(assignee),
            average_hours: hours.mean().map(round_tenths),
        })
        .collect();

    AverageByGroupTable {
        groups,
        assignee_averages,
    }
}

pub fn count_by_root_cause(records: &RecordSet<'_>) -> Vec<RootCauseCount> {
    group_records(records, TicketRecord::root_cause)
        .into_iter()
        .map(|(root_cause, hours)| RootCauseCount {
            root_cause: owned(root_cause),
            count: hours.count,
        })
        .collect()
}

#[derive(Debug, Clone, Copy, Default)]
struct HoursAccumulator {
    count: usize,
    hours_count: usize,
    hours_sum: f64,
}

impl HoursAccumulator {
    fn push(&mut self, hours: Option<f64>) {
        self.count += 1;
        if let Some(hours) = hours {
            self.hours_count += 1;
            self.hours_sum += hours;
        }
    }

    fn mean(&self) -> Option<f64> {
        (self.hours_count > 0).then(|| self.hours_sum / self.hours_count as f64)
    }
}

fn assignee_root_cause(record: &TicketRecord) -> (Option<&str>, Option<&str>) {
    (record.assignee(), record.root_cause())
}

// Insertion order of the map is first-encountered order of the key.
fn group_records<'a, K, F>(records: &RecordSet<'a>, key: F) -> IndexMap<K, HoursAccumulator>
where
    K: Hash + Eq,
    F: Fn(&'a TicketRecord) -> K,
{
    let mut groups: IndexMap<K, HoursAccumulator> = IndexMap::new();
    for record in records.iter() {
        groups.entry(key(record)).or_default().push(record.total_hours);
    }
    groups
}

fn owned(value: Option<&str>) -> Option<String> {
    value.map(str::to_owned)
}

mod aggregate;
mod filter;
mod session;

use kpi_core::ReportView;
use thiserror::Error;

pub use aggregate::{
    AssigneeAverage, AssigneeCount, AssigneeRootCauseAverage, AssigneeRootCauseCount,
    AverageByGroupTable, CountByGroupTable, RootCauseCount, SummaryAggregate, TicketHoursRow,
    ViewTable, average_by_group, build_view, count_by_group, count_by_root_cause, per_ticket,
};
pub use filter::{
    CategoricalField, CategoricalFilter, RecencyBounds, RecordSet, filter_recent, recency_bounds,
};
pub use session::{
    DashboardFeatures, DataSession, ReportRequest, ReportResult, ReportStatus, SessionOverrides,
};

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("config error: {0}")]
    Config(#[from] kpi_config::ConfigError),
    #[error("store error: {0}")]
    Store(#[from] kpi_store::StoreError),
    #[error("no tickets loaded; the recency window has no latest timestamp to anchor on")]
    EmptyStore,
    #[error("view '{}' is disabled by config [dashboard].root_cause_totals_view", view.as_str())]
    ViewDisabled { view: ReportView },
}

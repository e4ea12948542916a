use std::path::{Path, PathBuf};

use kpi_config::{DashboardConfig, KpiConfig, SourceFormat, resolve_source_path};
use kpi_core::{FilterCriteria, ReportView, TicketRecord};
use kpi_store::{LoadReport, RecordStore, open_source};
use serde::{Deserialize, Serialize};

use crate::AnalysisError;
use crate::aggregate::{SummaryAggregate, ViewTable, build_view};
use crate::filter::{CategoricalFilter, RecencyBounds, RecordSet, filter_recent, recency_bounds};

const REPORT_SCHEMA_VERSION: &str = "1.0";

/// Switches separating the full dashboard from the reduced variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardFeatures {
    pub categorical_filters: bool,
    pub root_cause_totals_view: bool,
}

impl Default for DashboardFeatures {
    fn default() -> Self {
        Self {
            categorical_filters: true,
            root_cause_totals_view: true,
        }
    }
}

impl From<&DashboardConfig> for DashboardFeatures {
    fn from(config: &DashboardConfig) -> Self {
        Self {
            categorical_filters: config.categorical_filters,
            root_cause_totals_view: config.root_cause_totals_view,
        }
    }
}

impl DashboardFeatures {
    pub fn offers(self, view: ReportView) -> bool {
        match view {
            ReportView::TotalTicketsByRootCause => self.root_cause_totals_view,
            ReportView::ResolutionTime
            | ReportView::TicketsByRootCause
            | ReportView::AverageHoursToResolve => true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionOverrides {
    pub source_path: Option<PathBuf>,
    pub format: Option<SourceFormat>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ReportRequest {
    pub criteria: FilterCriteria,
    pub view: ReportView,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Ready,
    NoMatchingData,
    EmptyStore,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportResult {
    pub schema_version: String,
    pub criteria: FilterCriteria,
    pub view: ReportView,
    pub status: ReportStatus,
    pub bounds: Option<RecencyBounds>,
    pub tickets: Vec<TicketRecord>,
    pub summary: Option<SummaryAggregate>,
    pub table: Option<ViewTable>,
    pub notes: Vec<String>,
}

impl ReportResult {
    fn without_data(
        request: &ReportRequest,
        criteria: FilterCriteria,
        status: ReportStatus,
        bounds: Option<RecencyBounds>,
        notes: Vec<String>,
    ) -> Self {
        Self {
            schema_version: REPORT_SCHEMA_VERSION.to_owned(),
            criteria,
            view: request.view,
            status,
            bounds,
            tickets: Vec::new(),
            summary: None,
            table: None,
            notes,
        }
    }
}

/// A loaded ticket table plus the dashboard switches that apply to it.
///
/// Built once; every report is a pure function of the session and the request.
#[derive(Debug, Clone)]
pub struct DataSession {
    store: RecordStore,
    features: DashboardFeatures,
    load_report: Option<LoadReport>,
}

impl DataSession {
    pub fn new(store: RecordStore, features: DashboardFeatures) -> Self {
        Self {
            store,
            features,
            load_report: None,
        }
    }

    /// Loads the configured ticket source. Override paths are used as given;
    /// the configured path is resolved against `workspace`.
    pub fn open(
        workspace: impl AsRef<Path>,
        config: &KpiConfig,
        overrides: &SessionOverrides,
    ) -> Result<Self, AnalysisError> {
        let path = overrides
            .source_path
            .clone()
            .unwrap_or_else(|| resolve_source_path(workspace, config));
        let format = overrides.format.unwrap_or(config.source.format);

        let source = open_source(&path, format, &config.source.sqlite_table)?;
        let (store, report) = RecordStore::load(source.as_ref(), config.source.invalid_rows)?;

        Ok(Self {
            store,
            features: DashboardFeatures::from(&config.dashboard),
            load_report: Some(report),
        })
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn features(&self) -> DashboardFeatures {
        self.features
    }

    pub fn load_report(&self) -> Option<&LoadReport> {
        self.load_report.as_ref()
    }

    pub fn available_views(&self) -> Vec<ReportView> {
        ReportView::ALL
            .into_iter()
            .filter(|view| self.features.offers(*view))
            .collect()
    }

    /// Recency window first, then the whitelists.
    pub fn filter(&self, criteria: &FilterCriteria) -> Result<RecordSet<'_>, AnalysisError> {
        let (criteria, _) = self.effective_criteria(criteria);
        let recent = filter_recent(&self.store, criteria.window.days())?;
        let filtered = CategoricalFilter::from_criteria(&criteria).apply(&recent);

        tracing::debug!(
            window_days = criteria.window.days(),
            recent = recent.len(),
            matched = filtered.len(),
            "applied ticket filters"
        );
        Ok(filtered)
    }

    pub fn report(&self, request: &ReportRequest) -> Result<ReportResult, AnalysisError> {
        if !self.features.offers(request.view) {
            return Err(AnalysisError::ViewDisabled { view: request.view });
        }

        let (criteria, mut notes) = self.effective_criteria(&request.criteria);
        let bounds = match recency_bounds(&self.store, criteria.window.days()) {
            Ok(bounds) => bounds,
            Err(AnalysisError::EmptyStore) => {
                notes.push("no tickets loaded; nothing to report".to_owned());
                return Ok(ReportResult::without_data(
                    request,
                    criteria,
                    ReportStatus::EmptyStore,
                    None,
                    notes,
                ));
            }
            Err(err) => return Err(err),
        };

        let records = self.filter(&criteria)?;
        let Some(summary) = SummaryAggregate::compute(&records) else {
            notes.push("no tickets found for the selected filters".to_owned());
            return Ok(ReportResult::without_data(
                request,
                criteria,
                ReportStatus::NoMatchingData,
                Some(bounds),
                notes,
            ));
        };
        if summary.average_hours.is_none() {
            notes.push("no matching ticket reports Total Hrs; averages unavailable".to_owned());
        }

        Ok(ReportResult {
            schema_version: REPORT_SCHEMA_VERSION.to_owned(),
            view: request.view,
            status: ReportStatus::Ready,
            bounds: Some(bounds),
            tickets: records.to_records(),
            table: Some(build_view(request.view, &records)),
            summary: Some(summary),
            criteria,
            notes,
        })
    }

    fn effective_criteria(&self, criteria: &FilterCriteria) -> (FilterCriteria, Vec<String>) {
        let mut notes = Vec::new();
        if self.features.categorical_filters || !criteria.has_categorical_filters() {
            return (criteria.clone(), notes);
        }

        tracing::warn!("categorical filters disabled; ignoring root cause and assignee selections");
        notes.push(
            "root cause and assignee filters disabled by config [dashboard].categorical_filters=false"
                .to_owned(),
        );
        (FilterCriteria::new(criteria.window), notes)
    }
}

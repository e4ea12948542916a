use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use kpi_analysis::{
    AverageByGroupTable, CountByGroupTable, DataSession, ReportRequest, ReportResult,
    ReportStatus, RootCauseCount, SessionOverrides, SummaryAggregate, TicketHoursRow, ViewTable,
};
use kpi_config::KpiConfig;
use kpi_core::{FilterCriteria, RecencyWindow, ReportView, TicketRecord};
use serde::Serialize;

use crate::cli::{OptionsArgs, OutputFormat, ReportArgs, SourceArgs};

pub const NO_TICKETS_MESSAGE: &str = "No tickets found for the selected filters.";
pub const NO_TICKET_DATA_MESSAGE: &str = "No ticket data loaded.";

const CREATED_FORMAT: &str = "%Y-%m-%d %H:%M";
const ABSENT_GROUP: &str = "(none)";

pub fn run_report_command(
    workspace: &Path,
    config: &KpiConfig,
    args: ReportArgs,
    out: &mut dyn Write,
) -> Result<()> {
    let session = open_session(workspace, config, &args.source)?;
    let window = args.window.unwrap_or(config.dashboard.default_window);
    let request = ReportRequest {
        criteria: FilterCriteria::new(window)
            .with_root_causes(args.root_causes)
            .with_assignees(args.assignees),
        view: args.view,
    };

    let result = session
        .report(&request)
        .context("failed to build ticket report")?;
    let base_url = config.dashboard.ticket_base_url.as_str();
    match args.output {
        OutputFormat::Table => {
            write_report_table(&result, base_url, out).context("failed to write report")?
        }
        OutputFormat::Json => write_report_json(&result, base_url, out)?,
    }
    Ok(())
}

pub fn run_options_command(
    workspace: &Path,
    config: &KpiConfig,
    args: OptionsArgs,
    out: &mut dyn Write,
) -> Result<()> {
    let session = open_session(workspace, config, &args.source)?;
    let options = FilterOptions::from_session(&session);
    match args.output {
        OutputFormat::Table => {
            write_options_table(&options, out).context("failed to write filter options")?
        }
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, &options)
                .context("failed to serialize filter options")?;
            writeln!(out).context("failed to write filter options")?;
        }
    }
    Ok(())
}

fn open_session(workspace: &Path, config: &KpiConfig, source: &SourceArgs) -> Result<DataSession> {
    let overrides = SessionOverrides {
        source_path: source.data.clone(),
        format: source.format,
    };
    DataSession::open(workspace, config, &overrides).context("failed to load ticket data")
}

pub fn ticket_link(base_url: &str, key: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), key)
}

/// Choices offered to the filter controls, in first-seen order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterOptions {
    pub root_causes: Vec<String>,
    pub assignees: Vec<String>,
    pub categorical_filters: bool,
    pub windows: Vec<RecencyWindow>,
    pub views: Vec<ReportView>,
}

impl FilterOptions {
    pub fn from_session(session: &DataSession) -> Self {
        Self {
            root_causes: session.store().root_cause_options(),
            assignees: session.store().assignee_options(),
            categorical_filters: session.features().categorical_filters,
            windows: RecencyWindow::ALL.to_vec(),
            views: session.available_views(),
        }
    }
}

pub fn write_options_table(options: &FilterOptions, out: &mut dyn Write) -> std::io::Result<()> {
    if !options.categorical_filters {
        writeln!(
            out,
            "note: root cause and assignee filters are disabled for this dashboard"
        )?;
    }

    writeln!(out, "Root Cause for PBSD")?;
    for value in &options.root_causes {
        writeln!(out, "{}", normalize_field(value))?;
    }

    writeln!(out)?;
    writeln!(out, "Assignee")?;
    for value in &options.assignees {
        writeln!(out, "{}", normalize_field(value))?;
    }

    writeln!(out)?;
    writeln!(out, "window\tlabel")?;
    for window in &options.windows {
        writeln!(out, "{}\t{}", window.days(), window.label())?;
    }

    writeln!(out)?;
    writeln!(out, "view\tlabel")?;
    for view in &options.views {
        writeln!(out, "{}\t{}", view.as_str(), view.label())?;
    }

    Ok(())
}

#[derive(Debug, Serialize)]
struct TicketLink<'a> {
    key: &'a str,
    url: String,
}

#[derive(Debug, Serialize)]
struct ReportOutput<'a> {
    #[serde(flatten)]
    report: &'a ReportResult,
    links: Vec<TicketLink<'a>>,
}

pub fn write_report_json(
    result: &ReportResult,
    base_url: &str,
    out: &mut dyn Write,
) -> Result<()> {
    let output = ReportOutput {
        report: result,
        links: result
            .tickets
            .iter()
            .map(|ticket| TicketLink {
                key: ticket.key.as_str(),
                url: ticket_link(base_url, &ticket.key),
            })
            .collect(),
    };
    serde_json::to_writer_pretty(&mut *out, &output).context("failed to serialize report")?;
    writeln!(out).context("failed to write report")?;
    Ok(())
}

pub fn write_report_table(
    result: &ReportResult,
    base_url: &str,
    out: &mut dyn Write,
) -> std::io::Result<()> {
    for note in &result.notes {
        writeln!(out, "note: {note}")?;
    }
    if let Some(bounds) = &result.bounds {
        writeln!(
            out,
            "Window: {} ({} to {})",
            result.criteria.window.label(),
            bounds.cutoff.format(CREATED_FORMAT),
            bounds.latest.format(CREATED_FORMAT)
        )?;
    }

    let summary = match (result.status, &result.summary) {
        (ReportStatus::Ready, Some(summary)) => summary,
        (ReportStatus::EmptyStore, _) => {
            writeln!(out, "{NO_TICKET_DATA_MESSAGE}")?;
            return Ok(());
        }
        _ => {
            writeln!(out, "{NO_TICKETS_MESSAGE}")?;
            writeln!(out, "{}", not_enough_data(result.view))?;
            return Ok(());
        }
    };

    writeln!(out, "{}", summary_line(summary))?;
    writeln!(out)?;
    write_ticket_table(&result.tickets, base_url, out)?;

    writeln!(out)?;
    writeln!(out, "{}", result.view.label())?;
    match &result.table {
        Some(ViewTable::AverageHoursToResolve(_)) if summary.average_hours.is_none() => {
            writeln!(out, "{}", not_enough_data(result.view))
        }
        Some(table) => write_view_table(table, out),
        None => writeln!(out, "{}", not_enough_data(result.view)),
    }
}

pub fn summary_line(summary: &SummaryAggregate) -> String {
    let average = match summary.display_average() {
        Some(average) => format!("{average:.1} hours"),
        None => "n/a".to_owned(),
    };
    format!(
        "Total Tickets Resolved: {} | Total Resolution Time: {:.1} hours | Average Resolution Time: {}",
        summary.count,
        summary.display_total(),
        average
    )
}

pub fn not_enough_data(view: ReportView) -> String {
    format!("Not enough data for {}.", view.label())
}

pub fn write_ticket_table(
    tickets: &[TicketRecord],
    base_url: &str,
    out: &mut dyn Write,
) -> std::io::Result<()> {
    writeln!(
        out,
        "Ticket Number\tSummary\tAssignee\tCustomer Request Type\tCreated\tRoot Cause for PBSD\tTotal Hrs\tLink"
    )?;

    for ticket in tickets {
        writeln!(
            out,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            normalize_field(&ticket.key),
            normalize_field(&ticket.summary),
            optional_field(ticket.assignee.as_deref()),
            optional_field(ticket.customer_request_type.as_deref()),
            ticket.created.format(CREATED_FORMAT),
            optional_field(ticket.root_cause.as_deref()),
            hours_field(ticket.total_hours),
            ticket_link(base_url, &ticket.key)
        )?;
    }

    Ok(())
}

pub fn write_view_table(table: &ViewTable, out: &mut dyn Write) -> std::io::Result<()> {
    match table {
        ViewTable::ResolutionTime(rows) => write_resolution_time(rows, out),
        ViewTable::TicketsByRootCause(table) => write_count_by_group(table, out),
        ViewTable::AverageHoursToResolve(table) => write_average_by_group(table, out),
        ViewTable::TotalTicketsByRootCause(rows) => write_root_cause_totals(rows, out),
    }
}

fn write_resolution_time(rows: &[TicketHoursRow], out: &mut dyn Write) -> std::io::Result<()> {
    writeln!(out, "Ticket Number\tAssignee\tTotal Hrs")?;
    for row in rows {
        writeln!(
            out,
            "{}\t{}\t{}",
            normalize_field(&row.key),
            group_field(row.assignee.as_deref()),
            hours_field(row.total_hours)
        )?;
    }
    Ok(())
}

fn write_count_by_group(table: &CountByGroupTable, out: &mut dyn Write) -> std::io::Result<()> {
    writeln!(out, "Assignee\tRoot Cause for PBSD\tTickets")?;
    for group in &table.groups {
        writeln!(
            out,
            "{}\t{}\t{}",
            group_field(group.assignee.as_deref()),
            group_field(group.root_cause.as_deref()),
            group.count
        )?;
    }

    writeln!(out)?;
    writeln!(out, "Assignee\tTotal Tickets")?;
    for total in &table.assignee_totals {
        writeln!(
            out,
            "{}\t{}",
            group_field(total.assignee.as_deref()),
            total.count
        )?;
    }
    Ok(())
}

fn write_average_by_group(
    table: &AverageByGroupTable,
    out: &mut dyn Write,
) -> std::io::Result<()> {
    writeln!(out, "Assignee\tRoot Cause for PBSD\tAverage Hrs")?;
    for group in &table.groups {
        writeln!(
            out,
            "{}\t{}\t{}",
            group_field(group.assignee.as_deref()),
            group_field(group.root_cause.as_deref()),
            hours_field(group.average_hours)
        )?;
    }

    writeln!(out)?;
    writeln!(out, "Assignee\tAverage Hrs (all root causes)")?;
    for average in &table.assignee_averages {
        writeln!(
            out,
            "{}\t{}",
            group_field(average.assignee.as_deref()),
            hours_field(average.average_hours)
        )?;
    }
    Ok(())
}

fn write_root_cause_totals(rows: &[RootCauseCount], out: &mut dyn Write) -> std::io::Result<()> {
    writeln!(out, "Root Cause for PBSD\tTickets")?;
    for row in rows {
        writeln!(out, "{}\t{}", group_field(row.root_cause.as_deref()), row.count)?;
    }
    Ok(())
}

fn hours_field(hours: Option<f64>) -> String {
    hours
        .map(|value| format!("{:.1}", kpi_core::round_tenths(value)))
        .unwrap_or_default()
}

fn optional_field(value: Option<&str>) -> String {
    value.map(normalize_field).unwrap_or_default()
}

fn group_field(value: Option<&str>) -> String {
    value
        .map(normalize_field)
        .unwrap_or_else(|| ABSENT_GROUP.to_owned())
}

fn normalize_field(value: &str) -> String {
    value.replace(['\t', '\n', '\r'], " ")
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveDateTime};
    use kpi_analysis::DashboardFeatures;
    use kpi_store::RecordStore;

    use super::*;

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, day)
            .expect("date")
            .and_hms_opt(hour, 0, 0)
            .expect("time")
    }

    fn session() -> DataSession {
        let store = RecordStore::from_records(vec![
            TicketRecord::new("PBSD-7", at(20, 9))
                .with_summary("Refresh\tfailed")
                .with_assignee("Asha")
                .with_customer_request_type("Incident")
                .with_root_cause("Gateway")
                .with_total_hours(3.0),
            TicketRecord::new("PBSD-8", at(21, 10))
                .with_summary("Slow page")
                .with_assignee("Asha")
                .with_root_cause("Model")
                .with_total_hours(1.0),
            TicketRecord::new("PBSD-9", at(22, 11)).with_summary("Unassigned question"),
        ]);
        DataSession::new(store, DashboardFeatures::default())
    }

    fn render(result: &ReportResult) -> String {
        let mut out = Vec::new();
        write_report_table(result, "https://jira.example.com/browse/", &mut out)
            .expect("write table");
        String::from_utf8(out).expect("utf8")
    }

    #[test]
    fn ticket_link_joins_base_url_and_key() {
        assert_eq!(
            ticket_link("https://jira.example.com/browse", "PBSD-7"),
            "https://jira.example.com/browse/PBSD-7"
        );
        assert_eq!(
            ticket_link("https://jira.example.com/browse/", "PBSD-7"),
            "https://jira.example.com/browse/PBSD-7"
        );
    }

    #[test]
    fn table_output_has_summary_ticket_rows_and_view() {
        let result = session()
            .report(&ReportRequest {
                criteria: FilterCriteria::new(RecencyWindow::Week),
                view: ReportView::TicketsByRootCause,
            })
            .expect("report");

        let rendered = render(&result);
        let lines = rendered.lines().collect::<Vec<_>>();

        assert_eq!(lines[0], "Window: 7 Days (2025-03-15 11:00 to 2025-03-22 11:00)");
        assert_eq!(
            lines[1],
            "Total Tickets Resolved: 3 | Total Resolution Time: 4.0 hours | Average Resolution Time: 2.0 hours"
        );
        assert_eq!(
            lines[3],
            "Ticket Number\tSummary\tAssignee\tCustomer Request Type\tCreated\tRoot Cause for PBSD\tTotal Hrs\tLink"
        );
        assert_eq!(
            lines[4],
            "PBSD-7\tRefresh failed\tAsha\tIncident\t2025-03-20 09:00\tGateway\t3.0\thttps://jira.example.com/browse/PBSD-7"
        );
        assert_eq!(
            lines[6],
            "PBSD-9\tUnassigned question\t\t\t2025-03-22 11:00\t\t\thttps://jira.example.com/browse/PBSD-9"
        );
        assert!(rendered.contains("Tickets by Root Cause"));
        assert!(rendered.contains("Asha\tGateway\t1\n"));
        assert!(rendered.contains("(none)\t(none)\t1\n"));
        assert!(rendered.contains("Assignee\tTotal Tickets\nAsha\t2\n(none)\t1\n"));
    }

    #[test]
    fn empty_selection_prints_notices_instead_of_tables() {
        let result = session()
            .report(&ReportRequest {
                criteria: FilterCriteria::new(RecencyWindow::Week).with_assignees(["Nobody"]),
                view: ReportView::AverageHoursToResolve,
            })
            .expect("report");

        let rendered = render(&result);

        assert!(rendered.contains(NO_TICKETS_MESSAGE));
        assert!(rendered.contains(&not_enough_data(ReportView::AverageHoursToResolve)));
        assert!(!rendered.contains("Total Tickets Resolved"));
        assert!(!rendered.contains("Ticket Number"));
    }

    #[test]
    fn empty_store_prints_no_data_notice() {
        let session = DataSession::new(RecordStore::default(), DashboardFeatures::default());
        let result = session.report(&ReportRequest::default()).expect("report");

        let rendered = render(&result);

        assert!(rendered.contains(NO_TICKET_DATA_MESSAGE));
        assert!(!rendered.contains(NO_TICKETS_MESSAGE));
    }

    #[test]
    fn average_view_without_reported_hours_prints_not_enough_data() {
        let store = RecordStore::from_records(vec![
            TicketRecord::new("PBSD-1", at(1, 9)).with_assignee("Asha"),
        ]);
        let session = DataSession::new(store, DashboardFeatures::default());
        let result = session
            .report(&ReportRequest {
                criteria: FilterCriteria::new(RecencyWindow::Month),
                view: ReportView::AverageHoursToResolve,
            })
            .expect("report");

        let rendered = render(&result);

        assert!(rendered.contains("Average Resolution Time: n/a"));
        assert!(rendered.ends_with(&format!(
            "{}\n",
            not_enough_data(ReportView::AverageHoursToResolve)
        )));
    }

    #[test]
    fn json_output_flattens_report_and_adds_links() {
        let result = session()
            .report(&ReportRequest {
                criteria: FilterCriteria::new(RecencyWindow::Week).with_root_causes(["Model"]),
                view: ReportView::TotalTicketsByRootCause,
            })
            .expect("report");

        let mut out = Vec::new();
        write_report_json(&result, "https://jira.example.com/browse", &mut out)
            .expect("write json");
        let value: serde_json::Value = serde_json::from_slice(&out).expect("parse json");

        assert_eq!(value["schema_version"], "1.0");
        assert_eq!(value["status"], "ready");
        assert_eq!(value["summary"]["count"], 1);
        assert_eq!(value["table"]["view"], "total_tickets_by_root_cause");
        assert_eq!(value["table"]["data"][0]["root_cause"], "Model");
        assert_eq!(value["links"][0]["key"], "PBSD-8");
        assert_eq!(
            value["links"][0]["url"],
            "https://jira.example.com/browse/PBSD-8"
        );
    }

    #[test]
    fn options_table_lists_choices_in_first_seen_order() {
        let options = FilterOptions::from_session(&session());

        let mut out = Vec::new();
        write_options_table(&options, &mut out).expect("write options");
        let rendered = String::from_utf8(out).expect("utf8");

        assert!(rendered.starts_with("Root Cause for PBSD\nGateway\nModel\n\nAssignee\nAsha\n"));
        assert!(rendered.contains("window\tlabel\n7\t7 Days\n15\t15 Days\n30\tLast Month\n"));
        assert!(rendered.contains("root-cause-totals\t"));
    }
}

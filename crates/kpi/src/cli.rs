use std::ffi::OsStr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use kpi_config::SourceFormat;
use kpi_core::{RecencyWindow, ReportView};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Human,
    Json,
}

impl LogFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Human => "human",
            Self::Json => "json",
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "human" => Ok(Self::Human),
            "json" => Ok(Self::Json),
            other => Err(format!(
                "invalid log format '{other}', expected one of: human, json"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

impl OutputFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::Json => "json",
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "table" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            other => Err(format!(
                "invalid output format '{other}', expected one of: table, json"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct InitArgs {
    #[arg(long, help = "Ticket export to record as [source].path")]
    pub data: Option<String>,

    #[arg(long, help = "Overwrite an existing config with defaults")]
    pub force: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct SourceArgs {
    #[arg(long, help = "Ticket export to load instead of the configured source")]
    pub data: Option<PathBuf>,

    #[arg(
        long,
        value_parser = parse_source_format,
        help = "Source format override: auto, json, json_lines, or sqlite"
    )]
    pub format: Option<SourceFormat>,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct OptionsArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    #[arg(
        long,
        default_value = "table",
        value_parser = parse_output_format,
        help = "Output format: table or json"
    )]
    pub output: OutputFormat,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct ReportArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    #[arg(
        long,
        value_parser = parse_window,
        help = "Recency window in days: 7, 15, or 30 (defaults to [dashboard].default_window)"
    )]
    pub window: Option<RecencyWindow>,

    #[arg(
        long = "root-cause",
        value_name = "ROOT_CAUSE",
        help = "Keep only tickets with this root cause (repeatable)"
    )]
    pub root_causes: Vec<String>,

    #[arg(
        long = "assignee",
        value_name = "ASSIGNEE",
        help = "Keep only tickets with this assignee (repeatable)"
    )]
    pub assignees: Vec<String>,

    #[arg(
        long,
        default_value = "resolution-time",
        value_parser = parse_view,
        help = "View: resolution-time, tickets-by-root-cause, average-hours, or root-cause-totals"
    )]
    pub view: ReportView,

    #[arg(
        long,
        default_value = "table",
        value_parser = parse_output_format,
        help = "Output format: table or json"
    )]
    pub output: OutputFormat,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Commands {
    /// Create .kpi/config.toml and optionally record the ticket export path
    Init(InitArgs),
    /// List the root cause and assignee values available for filtering
    Options(OptionsArgs),
    /// Filter tickets and print the summary, ticket table and one view
    Report(ReportArgs),
}

#[derive(Debug, Clone, Parser)]
#[command(author, version, about = "Support ticket KPI reports")]
pub struct Cli {
    #[arg(
        long,
        global = true,
        default_value = ".",
        help = "Workspace root holding .kpi/config.toml"
    )]
    pub workspace: PathBuf,

    #[arg(
        long,
        global = true,
        default_value = "human",
        value_parser = parse_log_format,
        help = "Log format: human or json"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

pub fn parse_cli() -> Cli {
    let mut args: Vec<_> = std::env::args_os().collect();
    if args.get(1).is_some_and(|arg| arg == OsStr::new("--")) {
        args.remove(1);
    }

    Cli::parse_from(args)
}

fn parse_log_format(value: &str) -> Result<LogFormat, String> {
    value.parse()
}

fn parse_output_format(value: &str) -> Result<OutputFormat, String> {
    value.parse()
}

fn parse_source_format(value: &str) -> Result<SourceFormat, String> {
    value.parse()
}

fn parse_window(value: &str) -> Result<RecencyWindow, String> {
    value.parse()
}

fn parse_view(value: &str) -> Result<ReportView, String> {
    value.parse()
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use kpi_config::SourceFormat;
    use kpi_core::{RecencyWindow, ReportView};

    use super::{Cli, Commands, LogFormat, OutputFormat};

    #[test]
    fn report_subcommand_parses_with_defaults() {
        let cli = Cli::try_parse_from(["kpi", "report"]).expect("report should parse");

        assert_eq!(cli.log_format, LogFormat::Human);
        match cli.command {
            Commands::Report(args) => {
                assert_eq!(args.window, None);
                assert!(args.root_causes.is_empty());
                assert!(args.assignees.is_empty());
                assert_eq!(args.view, ReportView::ResolutionTime);
                assert_eq!(args.output, OutputFormat::Table);
                assert_eq!(args.source.data, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn report_subcommand_parses_filters_view_and_output() {
        let cli = Cli::try_parse_from([
            "kpi",
            "--workspace",
            "/tmp/support",
            "report",
            "--window",
            "30",
            "--root-cause",
            "Gateway",
            "--root-cause",
            "Data Refresh",
            "--assignee",
            "Asha",
            "--view",
            "average-hours",
            "--output",
            "json",
            "--data",
            "exports/week.jsonl",
            "--format",
            "json_lines",
            "--log-format",
            "json",
        ])
        .expect("report with args should parse");

        assert_eq!(cli.workspace.to_str(), Some("/tmp/support"));
        assert_eq!(cli.log_format.as_str(), "json");
        match cli.command {
            Commands::Report(args) => {
                assert_eq!(args.window, Some(RecencyWindow::Month));
                assert_eq!(
                    args.root_causes,
                    vec!["Gateway".to_owned(), "Data Refresh".to_owned()]
                );
                assert_eq!(args.assignees, vec!["Asha".to_owned()]);
                assert_eq!(args.view, ReportView::AverageHoursToResolve);
                assert_eq!(args.output.as_str(), "json");
                assert_eq!(args.source.format, Some(SourceFormat::JsonLines));
                assert_eq!(
                    args.source.data.as_deref().and_then(|path| path.to_str()),
                    Some("exports/week.jsonl")
                );
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn report_rejects_windows_outside_the_fixed_choices() {
        let err = Cli::try_parse_from(["kpi", "report", "--window", "14"])
            .expect_err("14 days is not offered");
        assert!(err.to_string().contains("invalid window"));
    }

    #[test]
    fn report_rejects_unknown_views() {
        assert!(Cli::try_parse_from(["kpi", "report", "--view", "pie"]).is_err());
    }

    #[test]
    fn init_subcommand_parses_data_and_force() {
        let cli = Cli::try_parse_from(["kpi", "init", "--data", "tickets.sqlite", "--force"])
            .expect("init should parse");

        match cli.command {
            Commands::Init(args) => {
                assert_eq!(args.data.as_deref(), Some("tickets.sqlite"));
                assert!(args.force);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn options_subcommand_parses_output() {
        let cli = Cli::try_parse_from(["kpi", "options", "--output", "json"])
            .expect("options should parse");

        match cli.command {
            Commands::Options(args) => assert_eq!(args.output, OutputFormat::Json),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn a_subcommand_is_required() {
        assert!(Cli::try_parse_from(["kpi"]).is_err());
    }
}

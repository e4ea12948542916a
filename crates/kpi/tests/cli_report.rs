use std::fs;

use clap::Parser;
use kpi::cli::{Cli, Commands};
use kpi::init::run_init_command;
use kpi::report::{NO_TICKETS_MESSAGE, run_options_command, run_report_command};
use kpi_config::load_workspace_config;
use tempfile::tempdir;

const EXPORT: &str = r#"{"Key": "PBSD-200", "Summary": "Dataset refresh", "Assignee": "Asha", "Customer Request Type": "Incident", "Created": "2025-05-02 09:30:00", "Root Cause for PBSD": "Gateway", "Total Hrs": 4.0}
{"Key": "PBSD-201", "Summary": "Row level security", "Assignee": "Ravi", "Customer Request Type": "Access", "Created": "2025-05-05 13:00:00", "Root Cause for PBSD": "Permissions", "Total Hrs": 1.5}

{"Key": "PBSD-202", "Summary": "Visual timeout", "Assignee": "Asha", "Customer Request Type": "Incident", "Created": "2025-05-06 17:45:00", "Root Cause for PBSD": "Model", "Total Hrs": 2.0}
"#;

fn command(args: &[&str]) -> Commands {
    let mut argv = vec!["kpi"];
    argv.extend_from_slice(args);
    Cli::try_parse_from(argv).expect("parse cli").command
}

#[test]
fn init_then_report_from_a_json_lines_export() {
    let temp = tempdir().expect("tempdir");
    let workspace = temp.path();
    fs::write(workspace.join("pbsd.jsonl"), EXPORT).expect("write export");

    let Commands::Init(init) = command(&["init", "--data", "pbsd.jsonl"]) else {
        panic!("expected init");
    };
    run_init_command(workspace, &init, &mut Vec::new()).expect("init");
    let config = load_workspace_config(workspace).expect("load config");

    let Commands::Report(report) = command(&["report", "--assignee", "Asha"]) else {
        panic!("expected report");
    };
    let mut out = Vec::new();
    run_report_command(workspace, &config, report, &mut out).expect("report");
    let rendered = String::from_utf8(out).expect("utf8");

    assert!(rendered.contains(
        "Total Tickets Resolved: 2 | Total Resolution Time: 6.0 hours | Average Resolution Time: 3.0 hours"
    ));
    assert!(rendered.contains("https://jira.example.com/browse/PBSD-202"));
    assert!(!rendered.contains("PBSD-201"));
    assert!(rendered.contains("Existing Resolution Time Graph\nTicket Number\tAssignee\tTotal Hrs\n"));
}

#[test]
fn report_json_output_is_parseable() {
    let temp = tempdir().expect("tempdir");
    let workspace = temp.path();
    let export = workspace.join("pbsd.jsonl");
    fs::write(&export, EXPORT).expect("write export");
    let config = load_workspace_config(workspace).expect("defaults without a config file");

    let export_arg = export.to_str().expect("utf8 path");
    let Commands::Report(report) = command(&[
        "report",
        "--data",
        export_arg,
        "--window",
        "30",
        "--view",
        "root-cause-totals",
        "--output",
        "json",
    ]) else {
        panic!("expected report");
    };
    let mut out = Vec::new();
    run_report_command(workspace, &config, report, &mut out).expect("report");

    let value: serde_json::Value = serde_json::from_slice(&out).expect("json");
    assert_eq!(value["summary"]["count"], 3);
    assert_eq!(value["table"]["data"].as_array().map(Vec::len), Some(3));
    assert_eq!(value["links"].as_array().map(Vec::len), Some(3));
}

#[test]
fn unmatched_filters_print_the_empty_notice() {
    let temp = tempdir().expect("tempdir");
    let workspace = temp.path();
    fs::write(workspace.join("pbsd.jsonl"), EXPORT).expect("write export");
    let Commands::Init(init) = command(&["init", "--data", "pbsd.jsonl"]) else {
        panic!("expected init");
    };
    let config = run_init_command(workspace, &init, &mut Vec::new()).expect("init");

    let Commands::Report(report) = command(&["report", "--root-cause", "Licensing"]) else {
        panic!("expected report");
    };
    let mut out = Vec::new();
    run_report_command(workspace, &config, report, &mut out).expect("report");

    assert!(String::from_utf8(out).expect("utf8").contains(NO_TICKETS_MESSAGE));
}

#[test]
fn options_list_first_seen_values() {
    let temp = tempdir().expect("tempdir");
    let workspace = temp.path();
    fs::write(workspace.join("pbsd.jsonl"), EXPORT).expect("write export");
    let Commands::Init(init) = command(&["init", "--data", "pbsd.jsonl"]) else {
        panic!("expected init");
    };
    let config = run_init_command(workspace, &init, &mut Vec::new()).expect("init");

    let Commands::Options(options) = command(&["options", "--output", "json"]) else {
        panic!("expected options");
    };
    let mut out = Vec::new();
    run_options_command(workspace, &config, options, &mut out).expect("options");

    let value: serde_json::Value = serde_json::from_slice(&out).expect("json");
    assert_eq!(
        value["root_causes"],
        serde_json::json!(["Gateway", "Permissions", "Model"])
    );
    assert_eq!(value["assignees"], serde_json::json!(["Asha", "Ravi"]));
}

#[test]
fn missing_export_is_reported_with_context() {
    let temp = tempdir().expect("tempdir");
    let workspace = temp.path();
    let config = load_workspace_config(workspace).expect("defaults");

    let Commands::Report(report) = command(&["report"]) else {
        panic!("expected report");
    };
    let err = run_report_command(workspace, &config, report, &mut Vec::new())
        .expect_err("tickets.json does not exist");
    assert!(format!("{err:#}").contains("failed to load ticket data"));
}

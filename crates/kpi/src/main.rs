use std::path::Path;

use anyhow::{Context, Result};
use kpi::cli::{Cli, Commands, parse_cli};
use kpi::init::run_init_command;
use kpi::logging::init_tracing;
use kpi::report::{run_options_command, run_report_command};
use kpi_config::{KpiConfig, config_path, ensure_workspace_config, validate_config};

fn main() -> Result<()> {
    let cli = parse_cli();
    init_tracing(cli.log_format);
    run(cli)
}

fn run(cli: Cli) -> Result<()> {
    let workspace = cli.workspace.canonicalize().with_context(|| {
        format!(
            "failed to resolve workspace path {}",
            cli.workspace.display()
        )
    })?;
    tracing::debug!(workspace = %workspace.display(), "resolved workspace");

    let mut out = std::io::stdout();
    match cli.command {
        Commands::Init(args) => {
            let config = run_init_command(&workspace, &args, &mut out)?;
            print_config_warnings(&workspace, &config);
            Ok(())
        }
        Commands::Options(args) => {
            let config = load_config(&workspace)?;
            run_options_command(&workspace, &config, args, &mut out)
        }
        Commands::Report(args) => {
            let config = load_config(&workspace)?;
            run_report_command(&workspace, &config, args, &mut out)
        }
    }
}

fn load_config(workspace: &Path) -> Result<KpiConfig> {
    let config = ensure_workspace_config(workspace).with_context(|| {
        format!(
            "failed to load or create workspace config at {}",
            config_path(workspace).display()
        )
    })?;
    print_config_warnings(workspace, &config);
    Ok(config)
}

fn print_config_warnings(workspace: &Path, config: &KpiConfig) {
    for warning in validate_config(workspace, config) {
        eprintln!("KPI config warning [{}]: {}", warning.code, warning.message);
    }
}

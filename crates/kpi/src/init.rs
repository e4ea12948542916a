use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use kpi_config::{
    KpiConfig, config_path, ensure_workspace_config, resolve_source_path, set_source_path,
    write_workspace_config,
};

use crate::cli::InitArgs;

/// Creates (or with `--force`, resets) the workspace config, then records the
/// ticket export path when one was given.
pub fn run_init_command(
    workspace: &Path,
    args: &InitArgs,
    out: &mut dyn Write,
) -> Result<KpiConfig> {
    let path = config_path(workspace);
    let mut config = if args.force {
        write_workspace_config(workspace, &KpiConfig::default())
            .with_context(|| format!("failed to reset workspace config at {}", path.display()))?;
        KpiConfig::default()
    } else {
        ensure_workspace_config(workspace).with_context(|| {
            format!(
                "failed to load or create workspace config at {}",
                path.display()
            )
        })?
    };

    if let Some(data) = args.data.as_deref() {
        config = set_source_path(workspace, data)
            .with_context(|| format!("failed to record source path in {}", path.display()))?;
    }

    writeln!(out, "KPI: config ready at {}", path.display())?;
    writeln!(
        out,
        "KPI: source {} ({})",
        resolve_source_path(workspace, &config).display(),
        config.source.format.as_str()
    )?;
    Ok(config)
}

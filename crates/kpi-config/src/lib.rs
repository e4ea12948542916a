use std::fs;
use std::path::{Path, PathBuf};

use kpi_core::RecencyWindow;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const KPI_DIR_NAME: &str = ".kpi";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const DEFAULT_SOURCE_PATH: &str = "tickets.json";
pub const DEFAULT_SQLITE_TABLE: &str = "tickets";
pub const DEFAULT_TICKET_BASE_URL: &str = "https://jira.example.com/browse";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    #[default]
    Auto,
    Json,
    JsonLines,
    Sqlite,
}

impl SourceFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Json => "json",
            Self::JsonLines => "json_lines",
            Self::Sqlite => "sqlite",
        }
    }
}

impl std::str::FromStr for SourceFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "auto" => Ok(Self::Auto),
            "json" => Ok(Self::Json),
            "json_lines" | "jsonl" => Ok(Self::JsonLines),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(format!(
                "invalid source format '{other}', expected one of: auto, json, json_lines, sqlite"
            )),
        }
    }
}

/// What to do with a row whose required fields are missing or malformed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InvalidRowPolicy {
    #[default]
    Skip,
    Abort,
}

impl InvalidRowPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Skip => "skip",
            Self::Abort => "abort",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct KpiConfig {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_source_path")]
    pub path: String,
    #[serde(default)]
    pub format: SourceFormat,
    #[serde(default = "default_sqlite_table")]
    pub sqlite_table: String,
    #[serde(default)]
    pub invalid_rows: InvalidRowPolicy,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            path: default_source_path(),
            format: SourceFormat::Auto,
            sqlite_table: default_sqlite_table(),
            invalid_rows: InvalidRowPolicy::Skip,
        }
    }
}

/// Feature switches for the dashboard surface.
///
/// The lighter dashboard variant ran without whitelist filters and without the
/// root-cause totals view; both are on by default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_ticket_base_url")]
    pub ticket_base_url: String,
    #[serde(default)]
    pub default_window: RecencyWindow,
    #[serde(default = "default_true")]
    pub categorical_filters: bool,
    #[serde(default = "default_true")]
    pub root_cause_totals_view: bool,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            ticket_base_url: default_ticket_base_url(),
            default_window: RecencyWindow::Week,
            categorical_filters: true,
            root_cause_totals_view: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("failed to serialize config TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    #[error("failed to edit config TOML: {0}")]
    TomlEdit(#[from] toml_edit::TomlError),
}

pub fn kpi_dir(workspace_root: impl AsRef<Path>) -> PathBuf {
    workspace_root.as_ref().join(KPI_DIR_NAME)
}

pub fn config_path(workspace_root: impl AsRef<Path>) -> PathBuf {
    kpi_dir(workspace_root).join(CONFIG_FILE_NAME)
}

pub fn load_workspace_config(workspace_root: impl AsRef<Path>) -> Result<KpiConfig, ConfigError> {
    let path = config_path(workspace_root);
    if !path.exists() {
        return Ok(KpiConfig::default());
    }

    let raw = fs::read_to_string(path)?;
    let parsed: KpiConfig = toml::from_str(&raw)?;
    Ok(normalize_config(parsed))
}

pub fn ensure_workspace_config(
    workspace_root: impl AsRef<Path>,
) -> Result<KpiConfig, ConfigError> {
    let workspace_root = workspace_root.as_ref();
    fs::create_dir_all(kpi_dir(workspace_root))?;

    let path = config_path(workspace_root);
    if path.exists() {
        return load_workspace_config(workspace_root);
    }

    write_workspace_config(workspace_root, &KpiConfig::default())?;
    Ok(KpiConfig::default())
}

pub fn write_workspace_config(
    workspace_root: impl AsRef<Path>,
    config: &KpiConfig,
) -> Result<(), ConfigError> {
    let workspace_root = workspace_root.as_ref();
    fs::create_dir_all(kpi_dir(workspace_root))?;
    let content = toml::to_string_pretty(config)?;
    fs::write(config_path(workspace_root), content)?;
    Ok(())
}

/// Rewrites `[source].path` in place, keeping the rest of the file (comments
/// included) untouched.
pub fn set_source_path(
    workspace_root: impl AsRef<Path>,
    source_path: &str,
) -> Result<KpiConfig, ConfigError> {
    let workspace_root = workspace_root.as_ref();
    ensure_workspace_config(workspace_root)?;

    let path = config_path(workspace_root);
    let raw = fs::read_to_string(&path)?;
    let mut document = raw.parse::<toml_edit::DocumentMut>()?;
    if !document.contains_table("source") {
        document["source"] = toml_edit::table();
    }
    document["source"]["path"] = toml_edit::value(source_path.trim());
    fs::write(&path, document.to_string())?;

    load_workspace_config(workspace_root)
}

/// Resolves the configured source path against the workspace root.
pub fn resolve_source_path(workspace_root: impl AsRef<Path>, config: &KpiConfig) -> PathBuf {
    let configured = Path::new(&config.source.path);
    if configured.is_absolute() {
        configured.to_path_buf()
    } else {
        workspace_root.as_ref().join(configured)
    }
}

pub fn validate_config(workspace_root: impl AsRef<Path>, config: &KpiConfig) -> Vec<ConfigWarning> {
    let mut warnings = Vec::new();

    let base_url = config.dashboard.ticket_base_url.as_str();
    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        warnings.push(ConfigWarning {
            code: "ticket_base_url_scheme",
            message: format!(
                "[dashboard].ticket_base_url '{base_url}' is not an http(s) URL; ticket links will not open"
            ),
        });
    }

    let source = resolve_source_path(workspace_root, config);
    if !source.exists() {
        warnings.push(ConfigWarning {
            code: "source_missing",
            message: format!("[source].path {} does not exist", source.display()),
        });
    }

    let table = config.source.sqlite_table.as_str();
    if !is_sql_identifier(table) {
        warnings.push(ConfigWarning {
            code: "sqlite_table_name",
            message: format!(
                "[source].sqlite_table '{table}' is not a plain identifier; sqlite sources will be rejected"
            ),
        });
    }

    warnings
}

pub fn is_sql_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
        }
        _ => false,
    }
}

fn default_source_path() -> String {
    DEFAULT_SOURCE_PATH.to_owned()
}

fn default_sqlite_table() -> String {
    DEFAULT_SQLITE_TABLE.to_owned()
}

fn default_ticket_base_url() -> String {
    DEFAULT_TICKET_BASE_URL.to_owned()
}

fn default_true() -> bool {
    true
}

fn normalize_required(value: &str, fallback: fn() -> String) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        fallback()
    } else {
        trimmed.to_owned()
    }
}

fn normalize_config(mut config: KpiConfig) -> KpiConfig {
    config.source.path = normalize_required(&config.source.path, default_source_path);
    config.source.sqlite_table =
        normalize_required(&config.source.sqlite_table, default_sqlite_table);

    let base_url = normalize_required(&config.dashboard.ticket_base_url, default_ticket_base_url);
    config.dashboard.ticket_base_url = base_url.trim_end_matches('/').to_owned();

    config
}

use std::fs;
use std::path::{Path, PathBuf};

use kpi_config::SourceFormat;
use serde_json::{Map, Value};

use crate::StoreError;
use crate::row::{RawTicketRow, check_required_columns};
use crate::sqlite::SqliteTicketSource;

/// Anything that can hand over the raw ticket table.
pub trait TicketSource {
    fn describe(&self) -> String;
    fn load_rows(&self) -> Result<Vec<RawTicketRow>, StoreError>;
}

/// A JSON array of row objects, as produced by a spreadsheet "export as JSON".
#[derive(Debug, Clone)]
pub struct JsonTicketSource {
    path: PathBuf,
}

impl JsonTicketSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TicketSource for JsonTicketSource {
    fn describe(&self) -> String {
        format!("json:{}", self.path.display())
    }

    fn load_rows(&self) -> Result<Vec<RawTicketRow>, StoreError> {
        let raw = read_source(&self.path)?;
        let objects: Vec<Map<String, Value>> = serde_json::from_str(&raw)?;
        rows_from_objects(objects)
    }
}

/// One row object per line. Blank lines are ignored.
#[derive(Debug, Clone)]
pub struct JsonLinesTicketSource {
    path: PathBuf,
}

impl JsonLinesTicketSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TicketSource for JsonLinesTicketSource {
    fn describe(&self) -> String {
        format!("json_lines:{}", self.path.display())
    }

    fn load_rows(&self) -> Result<Vec<RawTicketRow>, StoreError> {
        let raw = read_source(&self.path)?;
        let objects = raw
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(index, line)| {
                serde_json::from_str::<Map<String, Value>>(line).map_err(|source| {
                    StoreError::JsonLine {
                        line: index + 1,
                        source,
                    }
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        rows_from_objects(objects)
    }
}

/// Builds the source for `path`, sniffing the format from the extension when
/// `format` is `Auto`.
pub fn open_source(
    path: impl AsRef<Path>,
    format: SourceFormat,
    sqlite_table: &str,
) -> Result<Box<dyn TicketSource>, StoreError> {
    let path = path.as_ref();
    let format = match format {
        SourceFormat::Auto => detect_format(path)?,
        explicit => explicit,
    };

    let source: Box<dyn TicketSource> = match format {
        SourceFormat::Json => Box::new(JsonTicketSource::new(path)),
        SourceFormat::JsonLines => Box::new(JsonLinesTicketSource::new(path)),
        SourceFormat::Sqlite => Box::new(SqliteTicketSource::new(path, sqlite_table)?),
        SourceFormat::Auto => {
            return Err(StoreError::UnsupportedFormat {
                path: path.to_path_buf(),
            });
        }
    };
    Ok(source)
}

pub fn detect_format(path: &Path) -> Result<SourceFormat, StoreError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("json") => Ok(SourceFormat::Json),
        Some("jsonl" | "ndjson") => Ok(SourceFormat::JsonLines),
        Some("sqlite" | "sqlite3" | "db") => Ok(SourceFormat::Sqlite),
        _ => Err(StoreError::UnsupportedFormat {
            path: path.to_path_buf(),
        }),
    }
}

/// JSON exports carry headers per object; a required header must appear in
/// at least one row. Rows that omit it elsewhere read as empty cells.
fn rows_from_objects(objects: Vec<Map<String, Value>>) -> Result<Vec<RawTicketRow>, StoreError> {
    if !objects.is_empty() {
        check_required_columns(|column| {
            objects.iter().any(|object| object.contains_key(column))
        })?;
    }

    objects
        .into_iter()
        .map(|object| {
            serde_json::from_value::<RawTicketRow>(Value::Object(object)).map_err(StoreError::from)
        })
        .collect()
}

fn read_source(path: &Path) -> Result<String, StoreError> {
    if !path.exists() {
        return Err(StoreError::SourceMissing {
            path: path.to_path_buf(),
        });
    }
    Ok(fs::read_to_string(path)?)
}

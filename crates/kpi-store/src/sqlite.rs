use std::path::{Path, PathBuf};

use kpi_config::is_sql_identifier;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};

use crate::StoreError;
use crate::row::{CellValue, RawTicketRow, check_required_columns};
use crate::source::TicketSource;

/// Reads tickets from a table whose column names match the export headers.
#[derive(Debug, Clone)]
pub struct SqliteTicketSource {
    path: PathBuf,
    table: String,
}

impl SqliteTicketSource {
    pub fn new(path: impl AsRef<Path>, table: &str) -> Result<Self, StoreError> {
        let table = table.trim();
        if !is_sql_identifier(table) {
            return Err(StoreError::InvalidTable {
                table: table.to_owned(),
            });
        }

        Ok(Self {
            path: path.as_ref().to_path_buf(),
            table: table.to_owned(),
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }
}

impl TicketSource for SqliteTicketSource {
    fn describe(&self) -> String {
        format!("sqlite:{}#{}", self.path.display(), self.table)
    }

    fn load_rows(&self) -> Result<Vec<RawTicketRow>, StoreError> {
        if !self.path.exists() {
            return Err(StoreError::SourceMissing {
                path: self.path.clone(),
            });
        }

        let conn = Connection::open_with_flags(&self.path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        let mut stmt = conn.prepare(&format!("SELECT * FROM \"{}\"", self.table))?;
        let columns = stmt
            .column_names()
            .into_iter()
            .map(str::to_owned)
            .collect::<Vec<_>>();

        check_required_columns(|required| columns.iter().any(|column| column == required))?;

        let rows = stmt.query_map([], |row| {
            let mut raw = RawTicketRow::default();
            for (index, column) in columns.iter().enumerate() {
                raw.set_column(column, cell_from_sql(row.get_ref(index)?));
            }
            Ok(raw)
        })?;

        let rows = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

fn cell_from_sql(value: ValueRef<'_>) -> Option<CellValue> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(value) => Some(CellValue::Integer(value)),
        ValueRef::Real(value) => Some(CellValue::Real(value)),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Some(CellValue::Text(String::from_utf8_lossy(bytes).into_owned()))
        }
    }
}

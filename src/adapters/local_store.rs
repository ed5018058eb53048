use crate::adapters::{csv_table, workbook};
use crate::domain::model::Table;
use crate::domain::ports::{TableStore, TableTarget};
use crate::utils::error::{Result, SyncError};
use std::path::Path;

pub const TABLE_EXTENSIONS: &[&str] = &["csv", "xlsx"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TableFormat {
    Csv,
    Workbook,
}

fn table_format(path: &Path) -> Result<TableFormat> {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    match ext.as_deref() {
        Some("csv") => Ok(TableFormat::Csv),
        Some("xlsx") => Ok(TableFormat::Workbook),
        _ => Err(SyncError::InvalidConfigValueError {
            field: "jobs.path".to_string(),
            value: path.display().to_string(),
            reason: format!("Destination must be one of: {}", TABLE_EXTENSIONS.join(", ")),
        }),
    }
}

fn sheet_name(target: &TableTarget) -> Result<&str> {
    target
        .table
        .as_deref()
        .ok_or_else(|| SyncError::MissingConfigError {
            field: format!("jobs.table for {}", target.path.display()),
        })
}

/// Destination tables on the local file system, chosen by file extension.
#[derive(Debug, Clone, Default)]
pub struct LocalTableStore;

impl LocalTableStore {
    pub fn new() -> Self {
        Self
    }
}

impl TableStore for LocalTableStore {
    fn load_table(&self, target: &TableTarget) -> Result<Table> {
        if !target.path.exists() {
            return Err(SyncError::DestinationNotFound {
                path: target.path.clone(),
            });
        }

        match table_format(&target.path)? {
            TableFormat::Csv => {
                let name = target.table.clone().unwrap_or_else(|| {
                    target
                        .path
                        .file_stem()
                        .map(|s| s.to_string_lossy().to_string())
                        .unwrap_or_default()
                });
                csv_table::read_csv_table(&target.path, &name)
            }
            TableFormat::Workbook => workbook::read_workbook_table(&target.path, sheet_name(target)?),
        }
    }

    fn save_table(&self, target: &TableTarget, table: &Table) -> Result<()> {
        match table_format(&target.path)? {
            TableFormat::Csv => csv_table::write_csv_table(&target.path, table),
            TableFormat::Workbook => {
                let sheet = sheet_name(target)?;
                if table.name != sheet {
                    let mut renamed = table.clone();
                    renamed.name = sheet.to_string();
                    return workbook::write_workbook_table(&target.path, &renamed);
                }
                workbook::write_workbook_table(&target.path, table)
            }
        }
    }
}

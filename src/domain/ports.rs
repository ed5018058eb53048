use crate::domain::model::Table;
use crate::utils::error::Result;
use std::path::{Path, PathBuf};

/// Where a job's table lives: a file, plus a sheet name for workbooks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableTarget {
    pub path: PathBuf,
    pub table: Option<String>,
}

impl TableTarget {
    pub fn new(path: impl Into<PathBuf>, table: Option<String>) -> Self {
        Self {
            path: path.into(),
            table,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn label(&self) -> String {
        match &self.table {
            Some(table) => format!("{} [{}]", self.path.display(), table),
            None => self.path.display().to_string(),
        }
    }
}

/// Loads and fully rewrites destination tables.
pub trait TableStore {
    fn load_table(&self, target: &TableTarget) -> Result<Table>;
    fn save_table(&self, target: &TableTarget, table: &Table) -> Result<()>;
}

/// One sheet of the source dataset; `Err` carries why it could not be read.
#[derive(Debug, Clone)]
pub struct SourceSheet {
    pub name: String,
    pub grid: std::result::Result<Table, String>,
}

/// Enumerates the sheets of a source dataset.
pub trait SheetSource {
    fn read_sheets(&self, path: &Path) -> Result<Vec<SourceSheet>>;
}

use crate::adapters::{csv_table, workbook};
use crate::domain::ports::{SheetSource, SourceSheet};
use crate::utils::error::{Result, SyncError};
use std::path::Path;

/// Reads source datasets from disk: every sheet of a workbook, or a CSV file as a single sheet.
#[derive(Debug, Clone, Default)]
pub struct FileSheetSource;

impl FileSheetSource {
    pub fn new() -> Self {
        Self
    }
}

fn is_csv(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("csv"))
        .unwrap_or(false)
}

impl SheetSource for FileSheetSource {
    fn read_sheets(&self, path: &Path) -> Result<Vec<SourceSheet>> {
        if !path.exists() {
            return Err(SyncError::SourceNotFound {
                path: path.to_path_buf(),
            });
        }

        let unreadable = |e: SyncError| SyncError::SourceUnreadable {
            path: path.to_path_buf(),
            message: e.to_string(),
        };

        if is_csv(path) {
            let name = path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "Sheet1".to_string());
            let table = csv_table::read_csv_table(path, &name).map_err(unreadable)?;
            return Ok(vec![SourceSheet {
                name,
                grid: Ok(table),
            }]);
        }

        let sheets = workbook::read_workbook(path).map_err(unreadable)?;
        Ok(sheets
            .into_iter()
            .map(|(name, grid)| SourceSheet { name, grid })
            .collect())
    }
}

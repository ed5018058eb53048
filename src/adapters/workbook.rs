//! Workbook tables (xlsx and friends): read with calamine, rewritten with rust_xlsxwriter.

use crate::adapters::atomic::write_atomic;
use crate::domain::model::{Cell, Table};
use crate::utils::error::{Result, SyncError};
use calamine::{open_workbook_auto, Data, Range, Reader};
use rust_xlsxwriter::{Format, Workbook};
use std::path::Path;

const DATE_FORMAT: &str = "yyyy-mm-dd";

pub fn cell_from_data(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::String(s) if s.is_empty() => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Float(f) => Cell::Number(*f),
        Data::Bool(b) => Cell::Bool(*b),
        Data::DateTime(dt) => Cell::DateTime(dt.as_f64()),
        Data::DateTimeIso(s) => Cell::Text(s.clone()),
        Data::DurationIso(s) => Cell::Text(s.clone()),
        Data::Error(e) => Cell::Text(e.to_string()),
    }
}

/// Converts a sheet range into a table, keeping column positions when the
/// used range does not start in the first column.
pub fn table_from_range(name: &str, range: &Range<Data>) -> Table {
    let col_offset = range.start().map(|(_, col)| col as usize).unwrap_or(0);

    let grid: Vec<Vec<Cell>> = range
        .rows()
        .map(|row| {
            let mut cells = vec![Cell::Empty; col_offset];
            cells.extend(row.iter().map(cell_from_data));
            cells
        })
        .collect();

    Table::from_grid(name, grid)
}

/// Every sheet of a workbook, in workbook order.
pub fn read_workbook(path: &Path) -> Result<Vec<(String, std::result::Result<Table, String>)>> {
    let mut workbook = open_workbook_auto(path)?;
    let sheet_names = workbook.sheet_names();

    let mut sheets = Vec::with_capacity(sheet_names.len());
    for sheet_name in sheet_names {
        let table = workbook
            .worksheet_range(&sheet_name)
            .map(|range| table_from_range(&sheet_name, &range))
            .map_err(|e| e.to_string());
        sheets.push((sheet_name, table));
    }
    Ok(sheets)
}

pub fn read_workbook_table(path: &Path, sheet: &str) -> Result<Table> {
    let mut workbook = open_workbook_auto(path)?;
    if !workbook.sheet_names().iter().any(|name| name == sheet) {
        return Err(SyncError::SchemaMismatch {
            table: sheet.to_string(),
            message: format!("sheet not found in workbook {}", path.display()),
        });
    }
    let range = workbook.worksheet_range(sheet)?;
    Ok(table_from_range(sheet, &range))
}

fn grid_index<T: TryFrom<usize>>(table: &Table, index: usize) -> Result<T> {
    T::try_from(index).map_err(|_| SyncError::SchemaMismatch {
        table: table.name.clone(),
        message: format!("position {} is outside the worksheet limits", index),
    })
}

pub fn render_workbook(tables: &[Table]) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let date_format = Format::new().set_num_format(DATE_FORMAT);

    for table in tables {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(&table.name)?;

        for (col, header) in table.headers.iter().enumerate() {
            if !header.is_empty() {
                worksheet.write_string(0, grid_index(table, col)?, header)?;
            }
        }

        for (row_idx, row) in table.rows.iter().enumerate() {
            let row_num: u32 = grid_index(table, row_idx + 1)?;
            for (col, cell) in row.iter().enumerate() {
                let col_num: u16 = grid_index(table, col)?;
                match cell {
                    Cell::Empty => {}
                    Cell::Text(s) => {
                        worksheet.write_string(row_num, col_num, s)?;
                    }
                    Cell::Number(n) => {
                        worksheet.write_number(row_num, col_num, *n)?;
                    }
                    Cell::Bool(b) => {
                        worksheet.write_boolean(row_num, col_num, *b)?;
                    }
                    Cell::DateTime(serial) => {
                        worksheet.write_number_with_format(row_num, col_num, *serial, &date_format)?;
                    }
                }
            }
        }
    }

    Ok(workbook.save_to_buffer()?)
}

/// Replaces one sheet and rewrites the whole workbook; the other sheets keep their cell values.
pub fn write_workbook_table(path: &Path, table: &Table) -> Result<()> {
    let mut tables = Vec::new();
    for (sheet_name, sheet) in read_workbook(path)? {
        if sheet_name == table.name {
            tables.push(table.clone());
            continue;
        }
        let existing = sheet.map_err(|message| SyncError::SchemaMismatch {
            table: sheet_name.clone(),
            message: format!("cannot carry sheet over during rewrite: {}", message),
        })?;
        tables.push(existing);
    }

    let data = render_workbook(&tables)?;
    write_atomic(path, &data)
}

//! CSV tables: one table per file, header in the first record.
//!
//! Fields are kept as raw text, and every record remembers the bytes it was
//! read from. Writing a table back over its file copies unchanged records
//! verbatim, so history rows keep their line endings and quoting.

use crate::adapters::atomic::write_atomic;
use crate::domain::model::{Cell, Table};
use crate::utils::error::{Result, SyncError};
use std::path::Path;

/// One parsed record plus the exact bytes it occupied, terminator included.
#[derive(Debug)]
struct RawRecord<'a> {
    cells: Vec<Cell>,
    raw: &'a [u8],
}

fn field_cell(field: &str) -> Cell {
    if field.is_empty() {
        Cell::Empty
    } else {
        Cell::Text(field.to_string())
    }
}

/// Splits `data` into records. Returns the records and whatever trails the
/// last one (blank lines at end of file).
fn split_records(data: &[u8]) -> Result<(Vec<RawRecord<'_>>, &[u8])> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(data);

    let mut records = Vec::new();
    let mut record = csv::StringRecord::new();
    let mut offset = 0usize;

    while reader.read_record(&mut record)? {
        let mut end = (reader.position().byte() as usize).clamp(offset, data.len());
        // the reader may stop before (or halfway through) the record terminator
        if data.get(end) == Some(&b'\r') && !data[..end].ends_with(b"\n") && !data[..end].ends_with(b"\r") {
            end += 1;
        }
        if data.get(end) == Some(&b'\n') && !data[..end].ends_with(b"\n") {
            end += 1;
        }

        records.push(RawRecord {
            cells: record.iter().map(field_cell).collect(),
            raw: &data[offset..end],
        });
        offset = end;
    }

    Ok((records, &data[offset..]))
}

/// CRLF when the first line break of `data` is one, LF otherwise.
fn detect_terminator(data: &[u8]) -> csv::Terminator {
    match data.iter().position(|&b| b == b'\n') {
        Some(idx) if idx > 0 && data[idx - 1] == b'\r' => csv::Terminator::CRLF,
        _ => csv::Terminator::Any(b'\n'),
    }
}

fn terminator_bytes(terminator: csv::Terminator) -> &'static [u8] {
    match terminator {
        csv::Terminator::CRLF => b"\r\n",
        _ => b"\n",
    }
}

fn serialize_record<I, F>(fields: I, terminator: csv::Terminator) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = F>,
    F: AsRef<[u8]>,
{
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .terminator(terminator)
        .from_writer(Vec::new());
    writer.write_record(fields)?;
    writer
        .into_inner()
        .map_err(|e| SyncError::IoError(e.into_error()))
}

/// Appends a freshly serialized record, first closing a final line that had no terminator.
fn push_record(out: &mut Vec<u8>, record: Vec<u8>, terminator: csv::Terminator) {
    if matches!(out.last(), Some(b) if *b != b'\n' && *b != b'\r') {
        out.extend_from_slice(terminator_bytes(terminator));
    }
    out.extend_from_slice(&record);
}

pub fn parse_csv_table(name: &str, data: &[u8]) -> Result<Table> {
    let (records, _) = split_records(data)?;
    let grid = records.into_iter().map(|r| r.cells).collect();
    Ok(Table::from_grid(name, grid))
}

/// Renders `table` as a new file.
pub fn render_csv_table(table: &Table) -> Result<Vec<u8>> {
    render_csv_table_over(&[], table)
}

/// Renders `table` in place of `original`, the bytes it was loaded from.
///
/// Header and rows whose cells still equal the original record are copied
/// byte-for-byte. Changed and appended rows are serialized with the line
/// terminator the original file uses.
pub fn render_csv_table_over(original: &[u8], table: &Table) -> Result<Vec<u8>> {
    let (records, trailer) = split_records(original)?;
    let terminator = detect_terminator(original);
    let mut out = Vec::with_capacity(original.len() + 128);

    let mut records = records.into_iter();
    match records.next() {
        Some(header) if header.cells.iter().map(Cell::render).eq(table.headers.iter().cloned()) => {
            out.extend_from_slice(header.raw);
        }
        _ => push_record(&mut out, serialize_record(&table.headers, terminator)?, terminator),
    }

    for row in &table.rows {
        match records.next() {
            Some(existing) if existing.cells == *row => out.extend_from_slice(existing.raw),
            _ => push_record(&mut out, serialize_record(row.iter().map(Cell::render), terminator)?, terminator),
        }
    }

    out.extend_from_slice(trailer);
    Ok(out)
}

pub fn read_csv_table(path: &Path, name: &str) -> Result<Table> {
    let data = std::fs::read(path)?;
    parse_csv_table(name, &data)
}

/// Rewrites `path` with `table`, keeping unchanged records of the current file verbatim.
pub fn write_csv_table(path: &Path, table: &Table) -> Result<()> {
    let original = if path.exists() {
        std::fs::read(path)?
    } else {
        Vec::new()
    };
    let data = render_csv_table_over(&original, table)?;
    write_atomic(path, &data)
}

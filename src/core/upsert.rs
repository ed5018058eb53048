//! Merges today's computed row into a destination table keyed by date.

use crate::config::DestinationConfig;
use crate::core::{leverage, statistics};
use crate::domain::model::{Cell, FlowLookup, JobSpec, MergeMode, MergeResult, SyncWarning, Table};
use crate::domain::ports::{TableStore, TableTarget};
use crate::utils::error::{Result, SyncError};
use chrono::NaiveDate;

/// One managed column of today's row.
#[derive(Debug, Clone)]
struct ResolvedColumn<'a> {
    name: &'a str,
    index: usize,
    value: f64,
}

fn schema_mismatch(table: &Table, message: String) -> SyncError {
    SyncError::SchemaMismatch {
        table: table.name.clone(),
        message,
    }
}

/// Date header, compared after trimming and ignoring a leading BOM.
pub fn locate_date_column(table: &Table, date_column: &str) -> Option<usize> {
    let wanted = date_column.trim();
    table
        .headers
        .iter()
        .position(|h| h.trim_start_matches('\u{feff}').trim().eq_ignore_ascii_case(wanted))
}

/// First row whose date cell falls on `date`.
pub fn find_date_row(table: &Table, date_col: usize, date: NaiveDate) -> Option<usize> {
    (0..table.rows.len()).find(|&row| table.cell(row, date_col).as_date() == Some(date))
}

fn resolve_columns<'a>(
    table: &Table,
    job: &'a JobSpec,
    job_name: &str,
    lookup: &FlowLookup,
    options: &DestinationConfig,
    warnings: &mut Vec<SyncWarning>,
    unresolved: &mut Vec<String>,
) -> Result<Vec<ResolvedColumn<'a>>> {
    let mut columns = Vec::new();

    for (column, identifier) in job.targets() {
        let Some(index) = table.column_index(column, options.header_matching) else {
            if job.is_simple() {
                return Err(schema_mismatch(
                    table,
                    format!("flow column '{}' not found", column),
                ));
            }
            let warning = SyncWarning::ColumnMissing {
                job: job_name.to_string(),
                table: table.name.clone(),
                column: column.to_string(),
            };
            tracing::warn!("{}", warning);
            warnings.push(warning);
            continue;
        };

        let value = match lookup.get(identifier) {
            Some(value) => value,
            None => {
                // unresolved ticker means zero flow, not "no data"
                let warning = SyncWarning::UnresolvedIdentifier {
                    job: job_name.to_string(),
                    column: column.to_string(),
                    identifier: identifier.to_string(),
                };
                tracing::warn!("{}", warning);
                warnings.push(warning);
                unresolved.push(identifier.to_string());
                0.0
            }
        };

        columns.push(ResolvedColumn {
            name: column,
            index,
            value,
        });
    }

    if columns.is_empty() {
        return Err(schema_mismatch(
            table,
            "none of the mapped columns exist in the destination".to_string(),
        ));
    }
    Ok(columns)
}

/// Applies the upsert to an in-memory table.
///
/// Only the managed cells of today's row change (plus the adjusted total and
/// statistics cells when the job asks for them). Every other cell keeps its
/// exact value; a newly appended row carries the no-value marker in every
/// unmanaged column.
pub fn merge_into_table(
    table: &mut Table,
    job: &JobSpec,
    lookup: &FlowLookup,
    today: NaiveDate,
    options: &DestinationConfig,
) -> Result<MergeResult> {
    let job_name = job.display_name();
    let mut warnings = Vec::new();
    let mut unresolved = Vec::new();

    let date_col = locate_date_column(table, &options.date_column).ok_or_else(|| {
        schema_mismatch(table, format!("'{}' column not found", options.date_column))
    })?;

    let columns = resolve_columns(table, job, &job_name, lookup, options, &mut warnings, &mut unresolved)?;

    let (mode, row) = match find_date_row(table, date_col, today) {
        Some(row) => {
            tracing::info!("Updating existing row for date: {}", today);
            (MergeMode::Updated, row)
        }
        None => {
            tracing::info!("Appending new row for date: {}", today);
            let template = (0..table.rows.len())
                .rev()
                .map(|r| table.cell(r, date_col))
                .find(|cell| cell.as_date().is_some())
                .cloned();
            let row = table.push_blank_row();
            table.set_cell(row, date_col, Cell::date_like(template.as_ref(), today));
            (MergeMode::Appended, row)
        }
    };

    for column in &columns {
        table.set_cell(row, column.index, Cell::Number(column.value));
    }

    let adjusted_total = match &job.adjusted_total_column {
        Some(total_column) => match table.column_index(total_column, options.header_matching) {
            Some(total_col) => {
                let total = leverage::adjusted_total(columns.iter().map(|c| (c.name, c.value)));
                table.set_cell(row, total_col, Cell::Number(total));
                tracing::info!("Set {} = {}", total_column, total);

                if job.statistics.as_ref().map(|s| s.enabled).unwrap_or(false) {
                    refresh_statistics(table, job, &job_name, date_col, total_col, options, &mut warnings);
                }
                Some(total)
            }
            None => {
                let warning = SyncWarning::ColumnMissing {
                    job: job_name.clone(),
                    table: table.name.clone(),
                    column: total_column.clone(),
                };
                tracing::warn!("{}", warning);
                warnings.push(warning);
                None
            }
        },
        None => None,
    };

    Ok(MergeResult {
        mode,
        columns_changed: columns.len(),
        date: today,
        unresolved,
        adjusted_total,
        warnings,
    })
}

fn refresh_statistics(
    table: &mut Table,
    job: &JobSpec,
    job_name: &str,
    date_col: usize,
    total_col: usize,
    options: &DestinationConfig,
    warnings: &mut Vec<SyncWarning>,
) {
    let vwap_col = match job.statistics.as_ref().and_then(|s| s.vwap_column.as_deref()) {
        Some(vwap) => {
            let found = table.column_index(vwap, options.header_matching);
            if found.is_none() {
                let warning = SyncWarning::ColumnMissing {
                    job: job_name.to_string(),
                    table: table.name.clone(),
                    column: vwap.to_string(),
                };
                tracing::warn!("{}", warning);
                warnings.push(warning);
            }
            found
        }
        None => None,
    };

    let filled = statistics::refresh_statistics(table, date_col, total_col, vwap_col);
    tracing::info!("Updated statistics table for {} ({} label(s))", table.name, filled);
}

/// Loads the destination, merges today's row and, unless `dry_run`, rewrites it.
pub fn upsert<T: TableStore>(
    store: &T,
    target: &TableTarget,
    job: &JobSpec,
    lookup: &FlowLookup,
    today: NaiveDate,
    options: &DestinationConfig,
    dry_run: bool,
) -> Result<MergeResult> {
    tracing::info!("Processing: {}", target.label());

    let mut table = store.load_table(target)?;
    let result = merge_into_table(&mut table, job, lookup, today, options)?;

    if dry_run {
        tracing::info!("Dry run, not saving {}", target.label());
    } else {
        store.save_table(target, &table)?;
        tracing::info!("Saved changes to: {}", target.label());
    }

    Ok(result)
}

//! Builds the identifier → flow value lookup from every sheet of the source dataset.

use crate::config::SourceConfig;
use crate::domain::model::{FlowLookup, SyncWarning, Table};
use crate::domain::ports::{SheetSource, SourceSheet};
use crate::utils::error::Result;

/// Reads the configured source and builds the lookup.
///
/// Only a missing or unreadable source is an error; sheets without the
/// required columns and rows with unusable values are skipped and reported
/// on `FlowLookup::warnings`.
pub fn build_lookup<S: SheetSource>(source: &S, config: &SourceConfig) -> Result<FlowLookup> {
    tracing::info!("Reading source file: {}", config.path.display());
    let sheets = source.read_sheets(&config.path)?;
    tracing::info!("Found {} sheet(s) in source file", sheets.len());

    let lookup = lookup_from_sheets(sheets, config);

    if lookup.is_empty() {
        tracing::warn!("No valid ticker data found in any sheet");
    } else {
        tracing::info!(
            "Created flow lookup map with {} total ticker(s) ({} sheet(s) skipped)",
            lookup.len(),
            lookup.sheets_skipped
        );
    }
    Ok(lookup)
}

pub fn lookup_from_sheets(sheets: Vec<SourceSheet>, config: &SourceConfig) -> FlowLookup {
    let mut lookup = FlowLookup::new();

    for sheet in sheets {
        lookup.sheets_scanned += 1;
        tracing::debug!("Processing sheet: {}", sheet.name);

        let table = match sheet.grid {
            Ok(table) => table,
            Err(reason) => {
                skip_sheet(&mut lookup, &sheet.name, format!("unreadable: {}", reason));
                continue;
            }
        };

        let Some(ident_col) = identifier_column(&table, config) else {
            skip_sheet(
                &mut lookup,
                &sheet.name,
                format!("'{}' column not found", config.identifier_column),
            );
            continue;
        };

        let Some(value_col) = value_column(&table, config) else {
            skip_sheet(
                &mut lookup,
                &sheet.name,
                format!("flow column '{}' not found", config.value_column),
            );
            continue;
        };

        tracing::debug!("Using flow column: '{}'", table.headers[value_col]);
        let extracted = extract_rows(&mut lookup, &table, ident_col, value_col, config);
        tracing::info!("Extracted {} ticker(s) from sheet '{}'", extracted, sheet.name);
    }

    lookup
}

fn skip_sheet(lookup: &mut FlowLookup, sheet: &str, reason: String) {
    let warning = SyncWarning::SheetSkipped {
        sheet: sheet.to_string(),
        reason,
    };
    tracing::warn!("{}", warning);
    lookup.sheets_skipped += 1;
    lookup.warnings.push(warning);
}

fn identifier_column(table: &Table, config: &SourceConfig) -> Option<usize> {
    let wanted = config.identifier_column.trim();
    table.headers.iter().position(|h| h.trim() == wanted)
}

/// The value header may carry a unit decoration and leading whitespace,
/// e.g. `" (M USD)"` or `"1D Flow (M USD)"`.
fn value_column(table: &Table, config: &SourceConfig) -> Option<usize> {
    let label = config.value_column.trim();
    let qualifier = config
        .value_column_qualifier
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty());

    table.headers.iter().position(|header| {
        header.trim() == label
            || qualifier
                .map(|q| header.contains(label) && header.contains(q))
                .unwrap_or(false)
    })
}

fn extract_rows(
    lookup: &mut FlowLookup,
    table: &Table,
    ident_col: usize,
    value_col: usize,
    config: &SourceConfig,
) -> usize {
    let mut extracted = 0;

    for idx in 0..table.rows.len() {
        let identifier = table.cell(idx, ident_col).render();
        let identifier = identifier.trim();

        if identifier.is_empty() || config.is_aggregate_marker(identifier) {
            lookup.rows_skipped += 1;
            continue;
        }

        let cell = table.cell(idx, value_col);
        if cell.is_empty() {
            lookup.rows_skipped += 1;
            continue;
        }

        match cell.as_f64() {
            Some(value) => {
                lookup.insert(identifier, value, config.duplicate_policy);
                extracted += 1;
            }
            None => {
                let warning = SyncWarning::MalformedValue {
                    sheet: table.name.clone(),
                    // 1-based, counting the header row
                    row: idx + 2,
                    identifier: identifier.to_string(),
                    value: cell.render(),
                };
                tracing::warn!("{}", warning);
                lookup.rows_skipped += 1;
                lookup.warnings.push(warning);
            }
        }
    }

    extracted
}

//! The LAST DAY / LAST 5 DAYS / LAST 20 DAYS block some destination sheets carry.
//!
//! Each label cell is followed by a flow cell and a VWAP cell; both are
//! recomputed from the dated rows after the merge.

use crate::domain::model::{Cell, Table};

const LAST_DAY: &str = "LAST DAY";
const LAST_5_DAYS: &str = "LAST 5 DAYS";
const LAST_20_DAYS: &str = "LAST 20 DAYS";

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WindowStats {
    pub flow: f64,
    pub vwap: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FlowStatistics {
    pub last_day: WindowStats,
    pub last_5_days: WindowStats,
    pub last_20_days: WindowStats,
}

/// Dated rows with a numeric total, in table order.
fn valid_points(table: &Table, date_col: usize, total_col: usize, vwap_col: Option<usize>) -> Vec<(f64, Option<f64>)> {
    (0..table.rows.len())
        .filter(|&row| table.cell(row, date_col).as_date().is_some())
        .filter_map(|row| {
            let total = table.cell(row, total_col).as_f64()?;
            let vwap = vwap_col.and_then(|col| table.cell(row, col).as_f64());
            Some((total, vwap))
        })
        .collect()
}

fn window(points: &[(f64, Option<f64>)], size: usize, with_vwap: bool) -> WindowStats {
    let tail = &points[points.len().saturating_sub(size)..];
    let flow: f64 = tail.iter().map(|(total, _)| total).sum();

    let vwap = with_vwap.then(|| {
        let values: Vec<f64> = tail.iter().filter_map(|(_, vwap)| *vwap).collect();
        if values.is_empty() {
            0.0
        } else {
            values.iter().sum::<f64>() / values.len() as f64
        }
    });

    WindowStats { flow, vwap }
}

pub fn compute_statistics(
    table: &Table,
    date_col: usize,
    total_col: usize,
    vwap_col: Option<usize>,
) -> Option<FlowStatistics> {
    let points = valid_points(table, date_col, total_col, vwap_col);
    let (last_total, _) = points.last()?;

    let last_day = WindowStats {
        flow: *last_total,
        // most recent row that has a VWAP, not necessarily the last row
        vwap: points.iter().rev().find_map(|(_, vwap)| *vwap),
    };

    Some(FlowStatistics {
        last_day,
        last_5_days: window(&points, 5, vwap_col.is_some()),
        last_20_days: window(&points, 20, vwap_col.is_some()),
    })
}

/// Writes the statistics next to every label cell. Returns how many labels were filled.
pub fn refresh_statistics(
    table: &mut Table,
    date_col: usize,
    total_col: usize,
    vwap_col: Option<usize>,
) -> usize {
    let Some(stats) = compute_statistics(table, date_col, total_col, vwap_col) else {
        return 0;
    };

    let width = table.width();
    let mut labels = Vec::new();
    for (row_idx, row) in table.rows.iter().enumerate() {
        for (col_idx, cell) in row.iter().enumerate() {
            let window = match cell.text().map(str::trim) {
                Some(LAST_DAY) => stats.last_day,
                Some(LAST_5_DAYS) => stats.last_5_days,
                Some(LAST_20_DAYS) => stats.last_20_days,
                _ => continue,
            };
            labels.push((row_idx, col_idx, window));
        }
    }

    for (row, col, window) in &labels {
        if col + 1 < width {
            table.set_cell(*row, col + 1, Cell::Number(window.flow));
        }
        if let Some(vwap) = window.vwap {
            if col + 2 < width {
                table.set_cell(*row, col + 2, Cell::Number(vwap));
            }
        }
    }

    tracing::debug!("Updated {} statistics label(s) in '{}'", labels.len(), table.name);
    labels.len()
}

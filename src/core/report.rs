use crate::adapters::atomic::write_atomic;
use crate::domain::model::{JobStatus, RunSummary};
use crate::utils::error::Result;
use std::fmt::Write;
use std::path::Path;

const RULE: &str = "================================================================================";

/// Plain-text summary printed at the end of a run.
pub fn render_summary(summary: &RunSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(out, "SYNCHRONIZATION SUMMARY ({})", summary.date);
    let _ = writeln!(out, "{}", RULE);
    for outcome in &summary.outcomes {
        match &outcome.status {
            JobStatus::Succeeded(merge) => {
                let _ = writeln!(
                    out,
                    "  OK    {} - {} {} column(s){}",
                    outcome.job,
                    merge.mode,
                    merge.columns_changed,
                    if merge.warnings.is_empty() {
                        String::new()
                    } else {
                        format!(", {} warning(s)", merge.warnings.len())
                    }
                );
            }
            JobStatus::Failed { error, .. } => {
                let _ = writeln!(out, "  FAIL  {} - {}", outcome.job, error);
            }
        }
    }
    let _ = writeln!(
        out,
        "Source: {} ticker(s) from {} sheet(s), {} sheet(s) and {} row(s) skipped",
        summary.lookup_size,
        summary.source.sheets_scanned,
        summary.source.sheets_skipped,
        summary.source.rows_skipped
    );
    let _ = writeln!(out, "Total jobs: {}", summary.total);
    let _ = writeln!(out, "Successful: {}", summary.succeeded);
    let _ = writeln!(out, "Failed: {}", summary.failed);
    if summary.dry_run {
        let _ = writeln!(out, "(dry run: no files were written)");
    }
    let _ = write!(out, "{}", RULE);
    out
}

pub fn write_report(path: &Path, summary: &RunSummary) -> Result<()> {
    let json = serde_json::to_vec_pretty(summary)?;
    write_atomic(path, &json)
}

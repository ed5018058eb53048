use chrono::{Days, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Workbook date serials count days from this epoch (1900 date system).
const SERIAL_EPOCH: (i32, u32, u32) = (1899, 12, 30);

const TEXT_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];
const TEXT_DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%m/%d/%Y %H:%M"];

/// A single table cell. `Empty` is the "no value" marker.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Cell {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    /// Workbook date serial, kept as-is so it can be written back unchanged.
    DateTime(f64),
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Numeric reading of the cell; text is parsed after trimming.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            Cell::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Cell::DateTime(serial) => serial_to_date(*serial),
            Cell::Text(s) => parse_text_date(s.trim()),
            _ => None,
        }
    }

    /// Today's date cell, shaped like the existing date cells of the table.
    pub fn date_like(template: Option<&Cell>, date: NaiveDate) -> Cell {
        match template {
            Some(Cell::DateTime(_)) => Cell::DateTime(date_to_serial(date)),
            _ => Cell::Text(date.format("%Y-%m-%d").to_string()),
        }
    }

    /// Text form used by CSV output. Untouched text cells come back byte-for-byte.
    pub fn render(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.clone(),
            Cell::Number(n) => n.to_string(),
            Cell::Bool(b) => (if *b { "TRUE" } else { "FALSE" }).to_string(),
            Cell::DateTime(serial) => match serial_to_date(*serial) {
                Some(date) => date.format("%Y-%m-%d").to_string(),
                None => serial.to_string(),
            },
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

fn serial_epoch() -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(SERIAL_EPOCH.0, SERIAL_EPOCH.1, SERIAL_EPOCH.2)
}

pub fn serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    serial_epoch()?.checked_add_days(Days::new(serial.floor() as u64))
}

pub fn date_to_serial(date: NaiveDate) -> f64 {
    serial_epoch()
        .map(|epoch| (date - epoch).num_days() as f64)
        .unwrap_or_default()
}

fn parse_text_date(text: &str) -> Option<NaiveDate> {
    if text.is_empty() {
        return None;
    }
    TEXT_DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .or_else(|| {
            TEXT_DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
                .map(|dt| dt.date())
        })
}

/// How destination headers are compared with configured column names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeaderMatching {
    /// Byte-for-byte, trailing spaces included.
    #[default]
    Exact,
    /// Exact first, then compare trimmed forms.
    Trimmed,
}

impl HeaderMatching {
    pub fn matches(self, header: &str, wanted: &str) -> bool {
        match self {
            HeaderMatching::Exact => header == wanted,
            HeaderMatching::Trimmed => header == wanted || header.trim() == wanted.trim(),
        }
    }
}

/// A named grid of cells whose first row is the header.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

static EMPTY_CELL: Cell = Cell::Empty;

impl Table {
    pub fn new(name: impl Into<String>, headers: Vec<String>) -> Self {
        Self {
            name: name.into(),
            headers,
            rows: Vec::new(),
        }
    }

    /// Builds a table from raw rows, taking the first one as header.
    pub fn from_grid(name: impl Into<String>, mut grid: Vec<Vec<Cell>>) -> Self {
        let headers = if grid.is_empty() {
            Vec::new()
        } else {
            grid.remove(0).iter().map(Cell::render).collect()
        };
        Self {
            name: name.into(),
            headers,
            rows: grid,
        }
    }

    pub fn column_index(&self, wanted: &str, matching: HeaderMatching) -> Option<usize> {
        self.headers
            .iter()
            .position(|h| h == wanted)
            .or_else(|| self.headers.iter().position(|h| matching.matches(h, wanted)))
    }

    pub fn cell(&self, row: usize, col: usize) -> &Cell {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY_CELL)
    }

    pub fn set_cell(&mut self, row: usize, col: usize, value: Cell) {
        if let Some(cells) = self.rows.get_mut(row) {
            if cells.len() <= col {
                cells.resize(col + 1, Cell::Empty);
            }
            cells[col] = value;
        }
    }

    /// Appends a row as wide as the header, every cell set to the no-value marker.
    pub fn push_blank_row(&mut self) -> usize {
        let width = self.headers.len().max(1);
        self.rows.push(vec![Cell::Empty; width]);
        self.rows.len() - 1
    }

    pub fn width(&self) -> usize {
        self.rows
            .iter()
            .map(Vec::len)
            .chain(std::iter::once(self.headers.len()))
            .max()
            .unwrap_or(0)
    }
}

/// Which entry wins when the same identifier appears twice in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    FirstSeen,
    #[default]
    LastSeen,
}

/// Non-fatal conditions raised while building the lookup or merging a job.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SyncWarning {
    UnresolvedIdentifier {
        job: String,
        column: String,
        identifier: String,
    },
    MalformedValue {
        sheet: String,
        row: usize,
        identifier: String,
        value: String,
    },
    SheetSkipped {
        sheet: String,
        reason: String,
    },
    ColumnMissing {
        job: String,
        table: String,
        column: String,
    },
}

impl fmt::Display for SyncWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncWarning::UnresolvedIdentifier {
                job,
                column,
                identifier,
            } => write!(
                f,
                "[{}] Ticker '{}' not found in flow map, using 0.0 for column '{}'",
                job, identifier, column
            ),
            SyncWarning::MalformedValue {
                sheet,
                row,
                identifier,
                value,
            } => write!(
                f,
                "Invalid flow value for ticker '{}' in sheet '{}' row {}: {}",
                identifier, sheet, row, value
            ),
            SyncWarning::SheetSkipped { sheet, reason } => {
                write!(f, "Sheet '{}' skipped: {}", sheet, reason)
            }
            SyncWarning::ColumnMissing { job, table, column } => write!(
                f,
                "[{}] Column '{}' not found in '{}', skipping",
                job, column, table
            ),
        }
    }
}

/// Identifier → flow value map built once per run.
#[derive(Debug, Clone, Default)]
pub struct FlowLookup {
    values: BTreeMap<String, f64>,
    pub sheets_scanned: usize,
    pub sheets_skipped: usize,
    pub rows_skipped: usize,
    pub warnings: Vec<SyncWarning>,
}

/// Sheets and rows the lookup build passed over, kept for the run report.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SourceReport {
    pub sheets_scanned: usize,
    pub sheets_skipped: usize,
    pub rows_skipped: usize,
    pub warnings: Vec<SyncWarning>,
}

impl FlowLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn source_report(&self) -> SourceReport {
        SourceReport {
            sheets_scanned: self.sheets_scanned,
            sheets_skipped: self.sheets_skipped,
            rows_skipped: self.rows_skipped,
            warnings: self.warnings.clone(),
        }
    }

    /// Records a value under the trimmed identifier. Returns false when the policy kept an earlier value.
    pub fn insert(&mut self, identifier: &str, value: f64, policy: DuplicatePolicy) -> bool {
        let key = identifier.trim();
        match policy {
            DuplicatePolicy::LastSeen => {
                if let Some(previous) = self.values.insert(key.to_string(), value) {
                    tracing::debug!("Ticker '{}' overridden: {} -> {}", key, previous, value);
                }
                true
            }
            DuplicatePolicy::FirstSeen => {
                if self.values.contains_key(key) {
                    tracing::debug!("Ticker '{}' already present, keeping first value", key);
                    false
                } else {
                    self.values.insert(key.to_string(), value);
                    true
                }
            }
        }
    }

    pub fn get(&self, identifier: &str) -> Option<f64> {
        self.values.get(identifier.trim()).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl FromIterator<(String, f64)> for FlowLookup {
    fn from_iter<T: IntoIterator<Item = (String, f64)>>(iter: T) -> Self {
        let mut lookup = FlowLookup::new();
        for (identifier, value) in iter {
            lookup.insert(&identifier, value, DuplicatePolicy::LastSeen);
        }
        lookup
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum JobKind {
    /// Several destination columns, each fed by one identifier.
    Complex { mapping: BTreeMap<String, String> },
    /// One identifier into one destination column.
    Simple { identifier: String, flow_column: String },
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StatisticsSpec {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub vwap_column: Option<String>,
}

fn default_true() -> bool {
    true
}

/// One destination table and how today's row is computed for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    pub name: Option<String>,
    pub path: PathBuf,
    /// Sheet name inside a workbook destination.
    pub table: Option<String>,
    #[serde(flatten)]
    pub kind: JobKind,
    pub adjusted_total_column: Option<String>,
    pub statistics: Option<StatisticsSpec>,
}

impl JobSpec {
    pub fn complex<P, I, K, V>(path: P, table: Option<&str>, mapping: I) -> Self
    where
        P: Into<PathBuf>,
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            name: None,
            path: path.into(),
            table: table.map(str::to_string),
            kind: JobKind::Complex {
                mapping: mapping
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            },
            adjusted_total_column: None,
            statistics: None,
        }
    }

    pub fn simple(path: impl Into<PathBuf>, table: Option<&str>, identifier: &str, flow_column: &str) -> Self {
        Self {
            name: None,
            path: path.into(),
            table: table.map(str::to_string),
            kind: JobKind::Simple {
                identifier: identifier.to_string(),
                flow_column: flow_column.to_string(),
            },
            adjusted_total_column: None,
            statistics: None,
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    /// Configured name, else the table name, else the file stem.
    pub fn display_name(&self) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }
        if let Some(table) = &self.table {
            return table.clone();
        }
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    /// (destination column, identifier) pairs in a fixed order.
    pub fn targets(&self) -> Vec<(&str, &str)> {
        match &self.kind {
            JobKind::Complex { mapping } => mapping
                .iter()
                .map(|(column, identifier)| (column.as_str(), identifier.as_str()))
                .collect(),
            JobKind::Simple {
                identifier,
                flow_column,
            } => vec![(flow_column.as_str(), identifier.as_str())],
        }
    }

    pub fn is_simple(&self) -> bool {
        matches!(self.kind, JobKind::Simple { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMode {
    Updated,
    Appended,
}

impl fmt::Display for MergeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeMode::Updated => write!(f, "updated"),
            MergeMode::Appended => write!(f, "appended"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergeResult {
    pub mode: MergeMode,
    pub columns_changed: usize,
    pub date: NaiveDate,
    pub unresolved: Vec<String>,
    pub adjusted_total: Option<f64>,
    pub warnings: Vec<SyncWarning>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum JobStatus {
    Succeeded(MergeResult),
    Failed { error: String, suggestion: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobOutcome {
    pub job: String,
    pub path: PathBuf,
    #[serde(flatten)]
    pub status: JobStatus,
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.status, JobStatus::Succeeded(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub date: NaiveDate,
    pub lookup_size: usize,
    pub source: SourceReport,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub dry_run: bool,
    pub outcomes: Vec<JobOutcome>,
}

impl RunSummary {
    pub fn new(date: NaiveDate, lookup: &FlowLookup, dry_run: bool, outcomes: Vec<JobOutcome>) -> Self {
        let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
        Self {
            date,
            lookup_size: lookup.len(),
            source: lookup.source_report(),
            total: outcomes.len(),
            succeeded,
            failed: outcomes.len() - succeeded,
            dry_run,
            outcomes,
        }
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_text_dates_in_common_layouts() {
        let expected = date(2025, 11, 17);
        for text in ["2025-11-17", "2025/11/17", "11/17/2025", "2025-11-17 00:00:00"] {
            assert_eq!(Cell::Text(text.to_string()).as_date(), Some(expected), "{}", text);
        }
        assert_eq!(Cell::Text("LAST DAY".to_string()).as_date(), None);
        assert_eq!(Cell::Number(45978.0).as_date(), None);
    }

    #[test]
    fn test_serial_dates() {
        let d = date(2025, 11, 17);
        let serial = date_to_serial(d);
        assert_eq!(serial, 45978.0);
        assert_eq!(Cell::DateTime(serial).as_date(), Some(d));
        assert_eq!(Cell::DateTime(serial + 0.5).as_date(), Some(d));
    }

    #[test]
    fn test_date_like_follows_template() {
        let d = date(2025, 11, 17);
        assert_eq!(Cell::date_like(None, d), Cell::Text("2025-11-17".to_string()));
        assert_eq!(
            Cell::date_like(Some(&Cell::DateTime(1.0)), d),
            Cell::DateTime(45978.0)
        );
    }

    #[test]
    fn test_header_matching_modes() {
        assert!(HeaderMatching::Exact.matches("IVV ", "IVV "));
        assert!(!HeaderMatching::Exact.matches("IVV", "IVV "));
        assert!(HeaderMatching::Trimmed.matches("IVV", "IVV "));
    }

    #[test]
    fn test_lookup_duplicate_policies() {
        let mut last = FlowLookup::new();
        last.insert("SPY US", 1.0, DuplicatePolicy::LastSeen);
        last.insert(" SPY US ", 2.0, DuplicatePolicy::LastSeen);
        assert_eq!(last.get("SPY US"), Some(2.0));
        assert_eq!(last.len(), 1);

        let mut first = FlowLookup::new();
        first.insert("SPY US", 1.0, DuplicatePolicy::FirstSeen);
        assert!(!first.insert("SPY US", 2.0, DuplicatePolicy::FirstSeen));
        assert_eq!(first.get(" SPY US"), Some(1.0));
    }

    #[test]
    fn test_set_cell_pads_short_rows() {
        let mut table = Table::new("t", vec!["Date".into(), "A".into(), "B".into()]);
        table.rows.push(vec![Cell::Text("2025-11-17".into())]);
        table.set_cell(0, 2, Cell::Number(3.0));
        assert_eq!(table.rows[0].len(), 3);
        assert_eq!(table.cell(0, 1), &Cell::Empty);
        assert_eq!(table.cell(0, 2), &Cell::Number(3.0));
        assert_eq!(table.cell(5, 5), &Cell::Empty);
    }

    #[test]
    fn test_job_display_name_fallbacks() {
        let named = JobSpec::simple("IBIT.csv", None, "IBIT US", "Flow").with_name("Bitcoin");
        assert_eq!(named.display_name(), "Bitcoin");

        let sheet = JobSpec::simple("Flows-2.xlsx", Some("IBIT"), "IBIT US", "Flow");
        assert_eq!(sheet.display_name(), "IBIT");

        let file = JobSpec::simple("flows/ETHA.csv", None, "ETHA US", "Flow");
        assert_eq!(file.display_name(), "ETHA");
    }
}

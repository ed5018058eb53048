use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Source file not found: {}", path.display())]
    SourceNotFound { path: PathBuf },

    #[error("Failed to read source file {}: {message}", path.display())]
    SourceUnreadable { path: PathBuf, message: String },

    #[error("No valid ticker data found in source file {}", path.display())]
    EmptyLookup { path: PathBuf },

    #[error("Destination not found: {}", path.display())]
    DestinationNotFound { path: PathBuf },

    #[error("Schema mismatch in '{table}': {message}")]
    SchemaMismatch { table: String, message: String },

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Workbook read error: {0}")]
    WorkbookError(#[from] calamine::Error),

    #[error("Workbook write error: {0}")]
    WorkbookWriteError(#[from] rust_xlsxwriter::XlsxError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration field: {field}")]
    MissingConfigError { field: String },
}

/// How far an error reaches: the whole run, or only the job that raised it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorScope {
    Run,
    Job,
}

impl SyncError {
    pub fn scope(&self) -> ErrorScope {
        match self {
            SyncError::SourceNotFound { .. }
            | SyncError::SourceUnreadable { .. }
            | SyncError::EmptyLookup { .. }
            | SyncError::ConfigError { .. }
            | SyncError::ConfigValidationError { .. }
            | SyncError::InvalidConfigValueError { .. }
            | SyncError::MissingConfigError { .. } => ErrorScope::Run,
            _ => ErrorScope::Job,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            SyncError::SourceNotFound { .. } => {
                "Check that the export file exists and source.path points at it"
            }
            SyncError::SourceUnreadable { .. } => {
                "Re-export the source file; it may be corrupt or still being written"
            }
            SyncError::EmptyLookup { .. } => {
                "Verify the source sheets carry a Ticker column and a flow column"
            }
            SyncError::DestinationNotFound { .. } => {
                "Create the destination file or fix the job path"
            }
            SyncError::SchemaMismatch { .. } => {
                "Compare the destination headers with the job mapping, including trailing spaces"
            }
            SyncError::CsvError(_) | SyncError::WorkbookError(_) => {
                "Open the destination file and check it is a valid table"
            }
            SyncError::IoError(_) | SyncError::WorkbookWriteError(_) => {
                "Check file permissions and that the file is not open in another program"
            }
            SyncError::SerializationError(_) => "Check the report path is writable",
            SyncError::ConfigError { .. }
            | SyncError::ConfigValidationError { .. }
            | SyncError::InvalidConfigValueError { .. }
            | SyncError::MissingConfigError { .. } => {
                "Fix the configuration file and run again"
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;

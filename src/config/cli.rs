use crate::config::SyncConfig;
use crate::core::RunOptions;
use crate::utils::error::{Result, SyncError};
use chrono::NaiveDate;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Compact,
    Json,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "flow-sync")]
#[command(about = "Upsert today's ETF flow figures from a source export into tracking sheets")]
pub struct CliConfig {
    /// Path to the TOML job configuration
    #[arg(short, long, default_value = "flow-sync.toml")]
    pub config: PathBuf,

    /// Override source.path from the config
    #[arg(long)]
    pub source: Option<PathBuf>,

    /// Override destination.root from the config
    #[arg(long)]
    pub destination_root: Option<PathBuf>,

    /// Date of the row to upsert (YYYY-MM-DD); defaults to today
    #[arg(long)]
    pub date: Option<String>,

    /// Run only these jobs (comma-separated names)
    #[arg(long, value_delimiter = ',')]
    pub only: Vec<String>,

    /// Merge in memory without writing any destination
    #[arg(long)]
    pub dry_run: bool,

    /// Write a JSON run report to this path
    #[arg(long)]
    pub report: Option<PathBuf>,

    #[arg(long, value_enum, default_value = "compact")]
    pub log_format: LogFormat,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,
}

impl CliConfig {
    pub fn run_date(&self) -> Result<NaiveDate> {
        match &self.date {
            Some(text) => NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d").map_err(|e| {
                SyncError::InvalidConfigValueError {
                    field: "--date".to_string(),
                    value: text.clone(),
                    reason: e.to_string(),
                }
            }),
            None => Ok(chrono::Local::now().date_naive()),
        }
    }

    pub fn run_options(&self) -> Result<RunOptions> {
        let mut options = RunOptions::for_date(self.run_date()?);
        options.dry_run = self.dry_run;
        if !self.only.is_empty() {
            options.only = Some(self.only.iter().map(|s| s.trim().to_string()).collect());
        }
        Ok(options)
    }

    /// Applies command-line overrides on top of the file config.
    pub fn apply_overrides(&self, config: &mut SyncConfig) {
        if let Some(source) = &self.source {
            tracing::info!("🔧 Source overridden to: {}", source.display());
            config.source.path = source.clone();
        }
        if let Some(root) = &self.destination_root {
            tracing::info!("🔧 Destination root overridden to: {}", root.display());
            config.destination.root = Some(root.clone());
        }
    }
}

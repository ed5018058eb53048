pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use adapters::{FileSheetSource, LocalTableStore};
pub use config::SyncConfig;
pub use self::core::{build_lookup, upsert, RunOptions, SyncEngine};
pub use domain::model::{FlowLookup, JobSpec, MergeMode, MergeResult, RunSummary};
pub use utils::error::{Result, SyncError};

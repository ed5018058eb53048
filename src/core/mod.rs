pub mod engine;
pub mod leverage;
pub mod lookup;
pub mod report;
pub mod statistics;
pub mod upsert;

pub use crate::domain::model::{FlowLookup, JobSpec, MergeResult, RunSummary, Table};
pub use crate::domain::ports::{SheetSource, TableStore, TableTarget};
pub use crate::utils::error::Result;
pub use engine::{RunOptions, SyncEngine};
pub use lookup::build_lookup;
pub use upsert::upsert;

#[cfg(feature = "cli")]
pub mod cli;
pub mod sync_config;

#[cfg(feature = "cli")]
pub use cli::{CliConfig, LogFormat};
pub use sync_config::{DestinationConfig, SourceConfig, SyncConfig, SyncInfo};

// Adapters layer: concrete implementations of the domain ports for local files.

pub mod atomic;
pub mod csv_table;
pub mod local_store;
pub mod source;
pub mod workbook;

pub use local_store::LocalTableStore;
pub use source::FileSheetSource;

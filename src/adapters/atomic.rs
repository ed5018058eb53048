use crate::utils::error::{Result, SyncError};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Writes `data` to a temp file beside `path`, then renames it over `path`.
/// A failure at any step leaves the previous file in place.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| SyncError::IoError(e.error))?;

    tracing::debug!("Wrote {} bytes to {}", data.len(), path.display());
    Ok(())
}

//! Reading the master test file and writing the derived one.
//!
//! The output is written to a temp file in the destination directory,
//! fsynced, then renamed over the target. A failed run leaves either the old
//! file or nothing, never a truncated one.

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::PrepError;

/// Read the whole master test file.
///
/// # Errors
/// Returns [`PrepError::SourceUnreadable`] if the file cannot be read.
pub fn read_source(path: &Path) -> Result<String, PrepError> {
    std::fs::read_to_string(path).map_err(|source| PrepError::SourceUnreadable {
        path: path.to_owned(),
        source,
    })
}

/// Write `contents` to `path` atomically.
///
/// # Errors
/// Returns [`PrepError::OutputUnwritable`] on any I/O failure; the temp file
/// is removed when that happens.
pub fn write_atomic(path: &Path, contents: &str) -> Result<(), PrepError> {
    let unwritable = |source| PrepError::OutputUnwritable {
        path: path.to_owned(),
        source,
    };

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(unwritable)?;
    tmp.write_all(contents.as_bytes()).map_err(unwritable)?;
    tmp.as_file().sync_all().map_err(unwritable)?;
    tmp.persist(path).map_err(|e| unwritable(e.error))?;

    tracing::debug!(path = %path.display(), bytes = contents.len(), "wrote derived test file");
    Ok(())
}

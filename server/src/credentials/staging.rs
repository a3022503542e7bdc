//! Staging of inline credential material onto disk.
//!
//! The document database client loads its key from a path, so inline JSON is written
//! to a temporary file first. The file is written once, is only readable by the
//! current user, and is kept for the lifetime of the process (it is never deleted).

use std::io::Write;
use std::path::{Path, PathBuf};

const STAGED_FILE_PREFIX: &str = "charger-credentials-";

/// Write `material` to a new file inside `dir` and return its path.
///
/// # Errors
///
/// Returns an error if the file cannot be created, written or persisted.
pub fn stage_inline_material(material: &str, dir: &Path) -> std::io::Result<PathBuf> {
    let mut file = tempfile::Builder::new()
        .prefix(STAGED_FILE_PREFIX)
        .suffix(".json")
        .tempfile_in(dir)?;
    file.write_all(material.as_bytes())?;
    file.flush()?;

    let (_, path) = file.keep().map_err(|e| e.error)?;
    tracing::debug!("staged inline credentials at {}", path.display());
    Ok(path)
}

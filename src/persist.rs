//! Whole-file JSON persistence shared by the identity and settings stores.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Writes `value` as pretty JSON using a temp file + rename.
///
/// The parent directory is created if missing. A crash before the rename
/// leaves the previous file contents intact.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {:?}", parent))?;
    }

    let json = serde_json::to_string_pretty(value).context("Failed to serialize JSON")?;
    let temp_path = path.with_extension("json.tmp");

    fs::write(&temp_path, &json)
        .with_context(|| format!("Failed to write temp file: {:?}", temp_path))?;

    fs::rename(&temp_path, path)
        .with_context(|| format!("Failed to rename temp file to {:?}", path))?;

    Ok(())
}

/// Reads a file to a string, returning `None` when it does not exist.
pub fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("Failed to read {:?}", path)),
    }
}

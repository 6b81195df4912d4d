//! File I/O primitives with consistent error handling.

use crate::error::{Error, Result};
use std::fs;
use std::path::Path;

/// Read file contents with standardized error handling.
pub fn read_file(path: &Path, operation: &str) -> Result<String> {
    fs::read_to_string(path)
        .map_err(|e| Error::internal_io(e.to_string(), Some(format!("{}: {}", operation, path.display()))))
}

/// Write content to file, creating parent directories as needed.
pub fn write_file(path: &Path, content: &str, operation: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| Error::internal_io(e.to_string(), Some(format!("{} (create dir)", operation))))?;
    }
    fs::write(path, content)
        .map_err(|e| Error::internal_io(e.to_string(), Some(format!("{}: {}", operation, path.display()))))
}

/// Remove a file if it exists. Missing files are not an error.
pub fn remove_file_if_exists(path: &Path, operation: &str) -> Result<()> {
    if path.exists() {
        fs::remove_file(path)
            .map_err(|e| Error::internal_io(e.to_string(), Some(operation.to_string())))?;
    }
    Ok(())
}

/// Remove a directory tree if it exists.
pub fn remove_dir_if_exists(path: &Path, operation: &str) -> Result<()> {
    if path.exists() {
        fs::remove_dir_all(path)
            .map_err(|e| Error::internal_io(e.to_string(), Some(operation.to_string())))?;
    }
    Ok(())
}

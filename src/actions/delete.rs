//! Removing files: system trash or permanent deletion.
//!
//! # Example
//!
//! ```no_run
//! use dupefox::actions::delete::delete_to_trash;
//! use std::path::Path;
//!
//! match delete_to_trash(Path::new("/path/to/duplicate.txt")) {
//!     Ok(bytes) => println!("Moved {} bytes to trash", bytes),
//!     Err(e) => eprintln!("Failed: {}", e),
//! }
//! ```

use std::fs;
use std::path::Path;

use super::{regular_file_size, ActionError};

/// Move a single file to the system trash.
///
/// This is the recoverable removal mode. Returns the size of the file.
///
/// # Errors
///
/// - `NotFound` if the file doesn't exist
/// - `PermissionDenied` if the file cannot be accessed
/// - `TrashFailed` if the trash operation fails
pub fn delete_to_trash(path: &Path) -> Result<u64, ActionError> {
    let size = regular_file_size(path)?;

    trash::delete(path).map_err(|e| ActionError::TrashFailed {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    log::info!("Moved to trash: {} ({} bytes)", path.display(), size);
    Ok(size)
}

/// Permanently delete a single file.
///
/// **WARNING**: This operation cannot be undone.
///
/// # Errors
///
/// - `NotFound` if the file doesn't exist
/// - `PermissionDenied` if deletion is not allowed
/// - `Io` if the delete operation fails otherwise
pub fn permanent_delete(path: &Path) -> Result<u64, ActionError> {
    let size = regular_file_size(path)?;

    fs::remove_file(path).map_err(|e| ActionError::from_io(path, e))?;

    log::info!("Permanently deleted: {} ({} bytes)", path.display(), size);
    Ok(size)
}

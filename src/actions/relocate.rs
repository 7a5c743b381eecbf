//! Moving files into a quarantine directory.
//!
//! Each file lands at `target/<file name>`. Nothing is ever overwritten:
//! an existing destination is reported as a collision and the file stays
//! where it is.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::{regular_file_size, ActionError};

/// Destination of `path` inside `target`.
///
/// # Errors
///
/// Returns `NotAFile` for paths without a final component (`/`, `..`).
pub fn destination_for(path: &Path, target: &Path) -> Result<PathBuf, ActionError> {
    let name = path
        .file_name()
        .ok_or_else(|| ActionError::NotAFile(path.to_path_buf()))?;
    Ok(target.join(name))
}

/// Move one file into `target`. Returns the size of the moved file.
///
/// A rename across filesystems falls back to copy and remove.
///
/// # Errors
///
/// - `Collision` if `target/<file name>` already exists
/// - `NotFound` / `PermissionDenied` / `Io` for filesystem failures
pub fn move_file(path: &Path, target: &Path) -> Result<u64, ActionError> {
    let size = regular_file_size(path)?;
    let destination = destination_for(path, target)?;

    if fs::symlink_metadata(&destination).is_ok() {
        return Err(ActionError::Collision {
            path: path.to_path_buf(),
            destination,
        });
    }

    match fs::rename(path, &destination) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            log::debug!(
                "{} is on another filesystem than {}, copying",
                path.display(),
                target.display()
            );
            copy_then_remove(path, &destination)?;
        }
        Err(e) => return Err(ActionError::from_io(path, e)),
    }

    log::info!("Moved {} -> {}", path.display(), destination.display());
    Ok(size)
}

fn copy_then_remove(path: &Path, destination: &Path) -> Result<(), ActionError> {
    fs::copy(path, destination).map_err(|e| {
        // Do not leave a partial copy behind.
        let _ = fs::remove_file(destination);
        ActionError::from_io(path, e)
    })?;

    if let Err(e) = fs::remove_file(path) {
        // The source is still there; drop the copy so the file exists once.
        let _ = fs::remove_file(destination);
        return Err(ActionError::from_io(path, e));
    }
    Ok(())
}

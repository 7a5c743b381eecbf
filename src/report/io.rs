//! Reading and writing report files.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use super::{Report, ReportError};

impl Report {
    /// Serialize as indented JSON with sorted keys and a trailing newline.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::Serialize`] if serialization fails.
    pub fn to_json(&self) -> Result<String, ReportError> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        Ok(json)
    }

    /// Write the report to `path`, replacing any existing file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or written.
    pub fn save(&self, path: &Path) -> Result<(), ReportError> {
        let json = self.to_json()?;
        let io_err = |source| ReportError::Io {
            path: path.to_path_buf(),
            source,
        };

        let file = File::create(path).map_err(io_err)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(json.as_bytes()).map_err(io_err)?;
        writer.flush().map_err(io_err)?;

        log::debug!("Saved report with {} group(s) to {}", self.len(), path.display());
        Ok(())
    }

    /// Load a report from `path`.
    ///
    /// # Errors
    ///
    /// A missing, unreadable or malformed file is an error.
    pub fn load(path: &Path) -> Result<Self, ReportError> {
        let content = std::fs::read_to_string(path).map_err(|source| ReportError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let report = parse(&content, path)?;

        log::debug!("Loaded report with {} group(s) from {}", report.len(), path.display());
        Ok(report)
    }
}

/// Anything but a map of hash to `{path: "keep" | "remove" | "rm"}` is a
/// parse error attributed to `origin`.
fn parse(json: &str, origin: &Path) -> Result<Report, ReportError> {
    serde_json::from_str(json).map_err(|source| ReportError::Parse {
        path: origin.to_path_buf(),
        source,
    })
}

/// Default report location for an index: the index path with `.json` appended.
///
/// `~/.local/share/dupefox/index.db` becomes `~/.local/share/dupefox/index.db.json`.
#[must_use]
pub fn default_report_path(index: &Path) -> PathBuf {
    let mut name = index.as_os_str().to_owned();
    name.push(".json");
    PathBuf::from(name)
}

//! CSV export of a report.
//!
//! One row per group member, for spreadsheets and ad-hoc filtering.
//!
//! # Columns
//!
//! - `hash`: BLAKE3 content hash (hexadecimal)
//! - `path`: Absolute path to the file
//! - `disposition`: `keep` or `remove`

use std::io;

use serde::Serialize;

use super::{Disposition, Report, ReportError};

#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    hash: &'a str,
    path: &'a str,
    disposition: Disposition,
}

impl Report {
    /// Write the report as CSV.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::Csv`] if writing fails.
    pub fn write_csv<W: io::Write>(&self, writer: W) -> Result<(), ReportError> {
        let mut csv_writer = ::csv::Writer::from_writer(writer);

        for (hash, members) in self.groups() {
            for (path, disposition) in members {
                csv_writer.serialize(CsvRow {
                    hash,
                    path,
                    disposition: *disposition,
                })?;
            }
        }

        csv_writer.flush().map_err(::csv::Error::from)?;
        Ok(())
    }
}

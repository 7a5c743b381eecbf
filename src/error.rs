//! Structured error handling and exit codes.

use serde::Serialize;

/// Exit codes for dupefox.
///
/// - 0: Success
/// - 1: General error (bad index, unknown rule, missing report, bad target)
/// - 3: Partial success (some file actions failed)
/// - 130: Interrupted by user (Ctrl+C)
///
/// Per-file warnings during `scan` or `report` do not change the exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// The command completed.
    Success = 0,
    /// General error: the command could not run.
    GeneralError = 1,
    /// Partial success: some files could not be moved or deleted.
    PartialSuccess = 3,
    /// Interrupted: Ctrl+C was pressed.
    Interrupted = 130,
}

impl ExitCode {
    /// Get the numeric exit code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Get the machine-readable code prefix.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "DF000",
            Self::GeneralError => "DF001",
            Self::PartialSuccess => "DF003",
            Self::Interrupted => "DF130",
        }
    }
}

/// Structured error information for JSON output.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// The error code (e.g., "DF001")
    pub code: String,
    /// The exit code number
    pub exit_code: i32,
    /// Human-readable error message, including its causes
    pub message: String,
    /// Whether the operation was interrupted
    pub interrupted: bool,
}

impl StructuredError {
    /// Create a new structured error from an anyhow error and an exit code.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: format!("{err:#}"),
            interrupted: exit_code == ExitCode::Interrupted,
        }
    }
}

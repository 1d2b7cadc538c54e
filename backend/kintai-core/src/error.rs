// src/error.rs

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

// --- Domain Error Type ---

/// Why a timesheet could not be resolved. All three surface as the same
/// [`ErrorKind::NotFound`], but carry different diagnostic text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundCause {
    FolderUnset,
    NameUnset,
    NoMatchingFile,
}

impl fmt::Display for NotFoundCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotFoundCause::FolderUnset => write!(f, "timesheet folder is not configured"),
            NotFoundCause::NameUnset => write!(f, "timesheet display name is not configured"),
            NotFoundCause::NoMatchingFile => write!(f, "no matching workbook in folder"),
        }
    }
}

#[derive(Error, Debug)]
pub enum AttendanceError {
    #[error("Timesheet not found for {name} {year}-{month:02} in '{folder}' ({cause})")]
    TimesheetNotFound {
        folder: String,
        name: String,
        year: i32,
        month: u32,
        cause: NotFoundCause,
    },

    #[error("No row for {month}/{day} could be recognized in '{file}'")]
    RowNotRecognized { file: String, month: u32, day: u32 },

    #[error("Start time for {month}/{day} is blank in '{file}'; clock in before clocking out")]
    ClockInMissing { file: String, month: u32, day: u32 },

    #[error("Timesheet is open in another process: {}", file_name(.path))]
    TimesheetLocked { path: PathBuf },

    #[error("Timesheet write error: {0}")]
    TimesheetWrite(String),

    #[error("No handling is defined for shift type '{0}'")]
    UnknownShiftType(String),

    #[error("Unexpected error: {0:#}")]
    Unexpected(#[from] anyhow::Error),
}

/// Coarse classification used by callers to pick a message and by the batch
/// loop to decide what to count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Locked,
    Write,
    UnknownShift,
    Unexpected,
}

impl AttendanceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AttendanceError::TimesheetNotFound { .. } | AttendanceError::RowNotRecognized { .. } => {
                ErrorKind::NotFound
            }
            AttendanceError::TimesheetLocked { .. } => ErrorKind::Locked,
            AttendanceError::ClockInMissing { .. } | AttendanceError::TimesheetWrite(_) => {
                ErrorKind::Write
            }
            AttendanceError::UnknownShiftType(_) => ErrorKind::UnknownShift,
            AttendanceError::Unexpected(_) => ErrorKind::Unexpected,
        }
    }

    /// The filename pattern a caller should tell the operator to look for.
    pub fn expected_file_pattern(&self) -> Option<String> {
        match self {
            AttendanceError::TimesheetNotFound {
                name, year, month, ..
            } => Some(format!("{:04}{:02}{}.xlsx", year, month, name)),
            _ => None,
        }
    }

    pub(crate) fn not_found(
        folder: impl Into<String>,
        name: impl Into<String>,
        year: i32,
        month: u32,
        cause: NotFoundCause,
    ) -> Self {
        AttendanceError::TimesheetNotFound {
            folder: folder.into(),
            name: name.into(),
            year,
            month,
            cause,
        }
    }
}

pub(crate) fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

// src/workbook.rs

use std::fs::{self, OpenOptions};
use std::io::{self, Cursor, Write};
use std::path::{Path, PathBuf};

use calamine::{Data, Range, Reader, Xlsx};
use chrono::{Datelike, NaiveDate};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::discovery;
use crate::error::{file_name, AttendanceError};
use crate::row_locator::{
    row_for_day, CellGrid, CellValue, COL_END, COL_OVERTIME, COL_REMARK, COL_SHIFT_LABEL,
    COL_START,
};
use crate::xlsx_patch::{self, CellPatch, SheetTarget, WorkbookError};

// --- Row Data ---

/// Values for one day's row. `None` leaves the column as it is in the file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RowData {
    pub date: NaiveDate,
    pub shift_label: Option<String>,
    /// Excel serial, fraction of a day.
    pub start_time: Option<f64>,
    pub end_time: Option<f64>,
    pub overtime_type: Option<String>,
    pub remark: Option<String>,
}

impl RowData {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            ..Self::default()
        }
    }

    fn cell_patches(&self) -> Vec<CellPatch> {
        let mut cells = Vec::new();
        if let Some(label) = &self.shift_label {
            cells.push(CellPatch::text(COL_SHIFT_LABEL, label.clone()));
        }
        if let Some(start) = self.start_time {
            cells.push(CellPatch::number(COL_START, start));
        }
        if let Some(end) = self.end_time {
            cells.push(CellPatch::number(COL_END, end));
        }
        if let Some(overtime) = &self.overtime_type {
            cells.push(CellPatch::text(COL_OVERTIME, overtime.clone()));
        }
        if let Some(remark) = &self.remark {
            cells.push(CellPatch::text(COL_REMARK, remark.clone()));
        }
        cells
    }
}

/// What the start-time column of a day's row holds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StartCell {
    Serial(f64),
    Blank,
    NotNumeric,
}

// --- Store Trait ---

/// Persistence seam between the attendance engine and the monthly workbook.
pub trait TimesheetStore {
    /// Workbook holding `date`'s month.
    fn locate(&self, config: &AppConfig, date: NaiveDate) -> Result<PathBuf, AttendanceError>;

    /// Start-time cell of `date`'s row.
    fn read_start_time(&self, path: &Path, date: NaiveDate) -> Result<StartCell, AttendanceError>;

    /// Writes the present fields of `row` and saves the workbook. Nothing is
    /// saved when this fails.
    fn write_row(&self, path: &Path, row: &RowData) -> Result<(), AttendanceError>;
}

// --- Xlsx Store ---

#[derive(Debug, Clone, Copy, Default)]
pub struct XlsxTimesheetStore;

impl XlsxTimesheetStore {
    pub fn new() -> Self {
        Self
    }
}

impl TimesheetStore for XlsxTimesheetStore {
    fn locate(&self, config: &AppConfig, date: NaiveDate) -> Result<PathBuf, AttendanceError> {
        discovery::resolve_timesheet(config, date)
    }

    fn read_start_time(&self, path: &Path, date: NaiveDate) -> Result<StartCell, AttendanceError> {
        let package = fs::read(path).map_err(|e| map_io_error(path, e))?;
        let (_, grid, row) = open_row(path, &package, date)?;
        let cell = grid.cell(row, COL_START);
        Ok(if cell.is_blank() {
            StartCell::Blank
        } else {
            match cell.as_number() {
                Some(serial) => StartCell::Serial(serial),
                None => StartCell::NotNumeric,
            }
        })
    }

    fn write_row(&self, path: &Path, row: &RowData) -> Result<(), AttendanceError> {
        check_writable(path)?;
        let package = fs::read(path).map_err(|e| map_io_error(path, e))?;
        let (sheet, _, row_num) = open_row(path, &package, row.date)?;

        let cells = row.cell_patches();
        if cells.is_empty() {
            debug!("Nothing to write for {} in {:?}", row.date, path);
            return Ok(());
        }

        let patched =
            xlsx_patch::patch_row(&package, &sheet.part, row_num, &cells).map_err(write_error)?;
        persist(path, &patched)?;
        info!(
            "Wrote {} cell(s) to row {} of {} ({})",
            cells.len(),
            row_num,
            file_name(path),
            row.date
        );
        Ok(())
    }
}

// --- Reading ---

/// The workbook's active worksheet and its values.
fn load_active(package: &[u8]) -> Result<(SheetTarget, Range<Data>), WorkbookError> {
    let sheet = xlsx_patch::active_sheet(package)?;
    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(package))?;
    let range = workbook.worksheet_range(&sheet.name)?;
    Ok((sheet, range))
}

fn open_row(
    path: &Path,
    package: &[u8],
    date: NaiveDate,
) -> Result<(SheetTarget, Range<Data>, u32), AttendanceError> {
    let (sheet, grid) = load_active(package).map_err(write_error)?;
    let row = row_for_day(&grid, date.day()).ok_or_else(|| AttendanceError::RowNotRecognized {
        file: file_name(path),
        month: date.month(),
        day: date.day(),
    })?;
    debug!("Day {} of {} is on row {}", date.day(), file_name(path), row);
    Ok((sheet, grid, row))
}

/// Cell value at the 1-based position on the active sheet of the workbook at `path`.
pub fn read_cell(path: &Path, row: u32, col: u32) -> Result<CellValue, AttendanceError> {
    let package = fs::read(path).map_err(|e| map_io_error(path, e))?;
    let (_, grid) = load_active(&package).map_err(write_error)?;
    Ok(grid.cell(row, col))
}

// --- Saving ---

fn write_error(err: WorkbookError) -> AttendanceError {
    AttendanceError::TimesheetWrite(err.to_string())
}

/// Sharing and lock violations on Windows.
const ERROR_SHARING_VIOLATION: i32 = 32;
const ERROR_LOCK_VIOLATION: i32 = 33;

fn is_lock_error(err: &io::Error) -> bool {
    if err.kind() == io::ErrorKind::PermissionDenied {
        return true;
    }
    cfg!(windows)
        && matches!(
            err.raw_os_error(),
            Some(ERROR_SHARING_VIOLATION) | Some(ERROR_LOCK_VIOLATION)
        )
}

fn map_io_error(path: &Path, err: io::Error) -> AttendanceError {
    if is_lock_error(&err) {
        AttendanceError::TimesheetLocked {
            path: path.to_path_buf(),
        }
    } else {
        AttendanceError::TimesheetWrite(format!("{}: {}", file_name(path), err))
    }
}

/// Opening for write fails while another process holds the file open.
fn check_writable(path: &Path) -> Result<(), AttendanceError> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map(drop)
        .map_err(|e| map_io_error(path, e))
}

/// Writes to a sibling temporary file, then renames it over `path`. The
/// replacement keeps the permissions of the file it replaces.
fn persist(path: &Path, bytes: &[u8]) -> Result<(), AttendanceError> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let permissions = fs::metadata(path)
        .map_err(|e| map_io_error(path, e))?
        .permissions();

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| map_io_error(path, e))?;
    tmp.write_all(bytes).map_err(|e| map_io_error(path, e))?;
    tmp.as_file()
        .set_permissions(permissions)
        .map_err(|e| map_io_error(path, e))?;
    tmp.as_file().sync_all().map_err(|e| map_io_error(path, e))?;
    tmp.persist(path).map_err(|e| map_io_error(path, e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_fields_produce_no_patches() {
        let date = NaiveDate::from_ymd_opt(2026, 2, 10).unwrap();
        assert!(RowData::new(date).cell_patches().is_empty());

        let row = RowData {
            end_time: Some(0.75),
            remark: Some("定時".into()),
            ..RowData::new(date)
        };
        let cols: Vec<u32> = row.cell_patches().iter().map(|c| c.col).collect();
        assert_eq!(cols, vec![COL_END, COL_REMARK]);
    }

    #[test]
    fn lock_errors_are_classified() {
        let path = Path::new("/share/202602山田.xlsx");
        let denied = io::Error::from(io::ErrorKind::PermissionDenied);
        assert!(matches!(
            map_io_error(path, denied),
            AttendanceError::TimesheetLocked { .. }
        ));
        let sharing = io::Error::from_raw_os_error(ERROR_SHARING_VIOLATION);
        assert_eq!(is_lock_error(&sharing), cfg!(windows));
        let missing = io::Error::from(io::ErrorKind::NotFound);
        assert!(matches!(
            map_io_error(path, missing),
            AttendanceError::TimesheetWrite(_)
        ));
    }
}

// src/discovery.rs

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate};
use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::error::{AttendanceError, NotFoundCause};

/// Prefix of the owner files Excel leaves next to an open workbook.
const EXCEL_OWNER_PREFIX: &str = "~$";

fn is_workbook(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("xlsx"))
}

/// First `.xlsx` directly inside `folder` whose name contains both `name`
/// and `YYYYMM`. Candidates are tried in file-name order.
pub fn find_timesheet(folder: &Path, name: &str, year: i32, month: u32) -> Option<PathBuf> {
    let year_month = format!("{:04}{:02}", year, month);

    let entries = match fs::read_dir(folder) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("Cannot list {:?}: {}", folder, e);
            return None;
        }
    };

    let mut candidates: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| is_workbook(p))
        .collect();
    candidates.sort();

    candidates.into_iter().find(|p| {
        let file_name = p.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        !file_name.starts_with(EXCEL_OWNER_PREFIX)
            && file_name.contains(name)
            && file_name.contains(&year_month)
    })
}

/// Workbook for `date`'s month according to the configured folder and name.
pub fn resolve_timesheet(config: &AppConfig, date: NaiveDate) -> Result<PathBuf, AttendanceError> {
    let folder = config.timesheet_folder.trim();
    let name = config.timesheet_name().trim();
    let (year, month) = (date.year(), date.month());

    let cause = if folder.is_empty() {
        NotFoundCause::FolderUnset
    } else if name.is_empty() {
        NotFoundCause::NameUnset
    } else {
        match find_timesheet(Path::new(folder), name, year, month) {
            Some(path) => {
                debug!("Resolved timesheet for {}-{:02}: {:?}", year, month, path);
                return Ok(path);
            }
            None => NotFoundCause::NoMatchingFile,
        }
    };

    warn!(
        "Timesheet for {}-{:02} not found in '{}' ({})",
        year, month, folder, cause
    );
    Err(AttendanceError::not_found(folder, name, year, month, cause))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"").unwrap();
    }

    fn config_for(dir: &Path) -> AppConfig {
        AppConfig {
            timesheet_folder: dir.to_string_lossy().into_owned(),
            display_name: "山田".into(),
            ..AppConfig::default()
        }
    }

    #[test]
    fn finds_file_by_name_and_month() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "202601山田.xlsx");
        touch(dir.path(), "202602佐藤.xlsx");
        touch(dir.path(), "202602山田.xlsx");
        touch(dir.path(), "202602山田.csv");

        let found = find_timesheet(dir.path(), "山田", 2026, 2).unwrap();
        assert_eq!(found.file_name().unwrap(), "202602山田.xlsx");
        assert!(find_timesheet(dir.path(), "山田", 2026, 3).is_none());
    }

    #[test]
    fn skips_excel_owner_files_and_ignores_extension_case() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "~$202602山田.xlsx");
        touch(dir.path(), "勤務表_202602_山田.XLSX");
        let found = find_timesheet(dir.path(), "山田", 2026, 2).unwrap();
        assert_eq!(found.file_name().unwrap(), "勤務表_202602_山田.XLSX");
    }

    #[test]
    fn missing_folder_is_not_found() {
        assert!(find_timesheet(Path::new("/nonexistent/kintai"), "山田", 2026, 2).is_none());
    }

    #[test]
    fn resolver_distinguishes_causes() {
        let dir = TempDir::new().unwrap();
        let date = NaiveDate::from_ymd_opt(2026, 2, 10).unwrap();

        let unset_folder = AppConfig {
            display_name: "山田".into(),
            ..AppConfig::default()
        };
        assert!(matches!(
            resolve_timesheet(&unset_folder, date),
            Err(AttendanceError::TimesheetNotFound { cause: NotFoundCause::FolderUnset, .. })
        ));

        let mut unset_name = config_for(dir.path());
        unset_name.display_name.clear();
        assert!(matches!(
            resolve_timesheet(&unset_name, date),
            Err(AttendanceError::TimesheetNotFound { cause: NotFoundCause::NameUnset, .. })
        ));

        let config = config_for(dir.path());
        match resolve_timesheet(&config, date) {
            Err(err @ AttendanceError::TimesheetNotFound { cause: NotFoundCause::NoMatchingFile, .. }) => {
                assert_eq!(err.expected_file_pattern().as_deref(), Some("202602山田.xlsx"));
            }
            other => panic!("expected NoMatchingFile, got {:?}", other),
        }

        touch(dir.path(), "202602山田.xlsx");
        assert!(resolve_timesheet(&config, date).is_ok());
    }
}

// src/status_export.rs

use std::fs;
use std::path::PathBuf;

use thiserror::Error;
use tracing::info;

use crate::config::AppConfig;
use crate::shift_catalog::WorkMode;

/// Appended to the shift in the status file when working remotely.
pub const REMOTE_SUFFIX: &str = "(ﾃ";

#[derive(Error, Debug)]
pub enum StatusExportError {
    #[error("I/O error: {context}: {source}")]
    Io {
        #[source]
        source: std::io::Error,
        context: String,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// `{output_folder}/{name}.csv`
pub fn status_file_path(config: &AppConfig) -> PathBuf {
    config.output_dir().join(format!("{}.csv", config.csv_name()))
}

pub fn shift_cell(shift: &str, mode: WorkMode) -> String {
    if mode.is_remote() {
        format!("{}{}", shift, REMOTE_SUFFIX)
    } else {
        shift.to_string()
    }
}

/// Overwrites the day's status file: a `name,shift` header and one data row.
pub fn write_status_csv(
    config: &AppConfig,
    shift: &str,
    mode: WorkMode,
) -> Result<PathBuf, StatusExportError> {
    let dir = config.output_dir();
    fs::create_dir_all(&dir).map_err(|e| StatusExportError::Io {
        source: e,
        context: format!("Failed to create output directory: {:?}", dir),
    })?;

    let path = status_file_path(config);
    let mut writer = csv::Writer::from_path(&path)?;
    writer.write_record(["name", "shift"])?;
    writer.write_record([config.csv_name(), shift_cell(shift, mode).as_str()])?;
    writer.flush().map_err(|e| StatusExportError::Io {
        source: e,
        context: format!("Failed to flush status file: {:?}", path),
    })?;

    info!("Status file written: {:?}", path);
    Ok(path)
}

// src/config.rs

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::shift_catalog::all_shift_names;

pub const DEFAULT_SETTINGS_FILE: &str = "settings.json";
pub const DEFAULT_OUTPUT_FOLDER: &str = "attendance_data";
const ENV_PREFIX: &str = "KINTAI_";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {context}: {source}")]
    Io {
        #[source]
        source: std::io::Error,
        context: String,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Environment error: {0}")]
    Env(#[from] envy::Error),
}

fn io_context(err: std::io::Error, context: String) -> ConfigError {
    ConfigError::Io {
        source: err,
        context,
    }
}

// --- Settings File ---

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manager {
    pub name: String,
    pub teams_id: String,
}

/// Operator settings, persisted as `settings.json`. Unknown keys are ignored
/// and missing keys fall back to their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub ad_name: String,
    pub display_name: String,
    pub teams_user_id: String,
    pub shift_display_name: String,
    pub timesheet_display_name: String,
    pub webhook_url: String,
    pub timesheet_folder: String,
    pub output_folder: String,
    pub shift_types: Vec<String>,
    pub managers: Vec<Manager>,
    /// `YYYY-MM-DD`; empty disables the override.
    pub test_date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_debug_file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ad_name: String::new(),
            display_name: String::new(),
            teams_user_id: String::new(),
            shift_display_name: String::new(),
            timesheet_display_name: String::new(),
            webhook_url: String::new(),
            timesheet_folder: String::new(),
            output_folder: DEFAULT_OUTPUT_FOLDER.to_string(),
            shift_types: all_shift_names(),
            managers: Vec::new(),
            test_date: String::new(),
            payload_debug_file: None,
        }
    }
}

impl AppConfig {
    /// Missing file gives the defaults. A file that cannot be read or parsed
    /// also gives the defaults, with a warning.
    pub fn load(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(Some(config)) => config,
            Ok(None) => {
                debug!("No settings file at {:?}, using defaults", path);
                Self::default()
            }
            Err(e) => {
                warn!("Failed to load settings from {:?}, using defaults: {}", path, e);
                Self::default()
            }
        }
    }

    pub fn try_load(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }
        let json_string = fs::read_to_string(path)
            .map_err(|e| io_context(e, format!("Failed to read settings file: {:?}", path)))?;
        let config: AppConfig = serde_json::from_str(&json_string)?;
        Ok(Some(config))
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let json_string = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                io_context(
                    e,
                    format!("Failed to create directory for settings file: {:?}", parent),
                )
            })?;
        }
        fs::write(path, json_string)
            .map_err(|e| io_context(e, format!("Failed to write settings file: {:?}", path)))
    }

    /// Name searched for in workbook filenames.
    pub fn timesheet_name(&self) -> &str {
        if self.timesheet_display_name.is_empty() {
            &self.display_name
        } else {
            &self.timesheet_display_name
        }
    }

    /// Name used for the status CSV file and its `name` column.
    pub fn csv_name(&self) -> &str {
        if self.shift_display_name.is_empty() {
            &self.display_name
        } else {
            &self.shift_display_name
        }
    }

    pub fn output_dir(&self) -> PathBuf {
        if self.output_folder.trim().is_empty() {
            PathBuf::from(DEFAULT_OUTPUT_FOLDER)
        } else {
            PathBuf::from(&self.output_folder)
        }
    }

    pub fn find_manager(&self, name: &str) -> Option<&Manager> {
        self.managers.iter().find(|m| m.name == name)
    }
}

// --- Environment Overrides ---

/// `KINTAI_SETTINGS`, `KINTAI_TEST_DATE`, `KINTAI_LOG_FILE`, read from the
/// process environment after loading any `.env` file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnvOverrides {
    pub settings: Option<PathBuf>,
    pub test_date: Option<String>,
    pub log_file: Option<PathBuf>,
}

impl EnvOverrides {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Ok(envy::prefixed(ENV_PREFIX).from_env::<EnvOverrides>()?)
    }

    pub fn settings_path(&self) -> PathBuf {
        self.settings
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_FILE))
    }

    /// Environment wins over the settings file; blank values count as unset.
    pub fn effective_test_date<'a>(&'a self, config: &'a AppConfig) -> Option<&'a str> {
        self.test_date
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .or_else(|| Some(config.test_date.trim()).filter(|s| !s.is_empty()))
    }
}

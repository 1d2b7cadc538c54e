// src/lib.rs

pub mod attendance;
pub mod clock;
pub mod config;
pub mod discovery;
pub mod error;
pub mod holidays;
pub mod notification;
pub mod row_locator;
pub mod shift_catalog;
pub mod status_export;
pub mod time_utils;
pub mod workbook;
pub mod xlsx_patch;

#[cfg(test)]
mod notification_tests;
#[cfg(test)]
mod workbook_tests;

pub use attendance::{
    AttendanceService, BatchRequest, BatchSummary, ClockInRequest, ClockOutRequest, ClockOutcome,
    HalfDayInput, InputProvider, StatusLevel, StatusSink,
};
pub use clock::{Clock, SystemClock, TestClock};
pub use config::{AppConfig, EnvOverrides};
pub use error::{AttendanceError, ErrorKind, NotFoundCause};
pub use notification::{ClockOutInfo, NotificationEvent, Notifier, TeamsWebhookNotifier};
pub use shift_catalog::{ShiftKind, WorkMode};
pub use workbook::{RowData, TimesheetStore, XlsxTimesheetStore};

// src/attendance.rs

use chrono::{Datelike, Duration, NaiveDate};
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::config::AppConfig;
use crate::error::{file_name, AttendanceError, ErrorKind};
use crate::notification::{ClockOutInfo, NotificationEvent, Notifier};
use crate::shift_catalog::{
    FixedVacation, PromptedVacation, RealtimeShift, ShiftKind, WorkMode, HALF_DAY_PAID,
    LATE_MARKER, OVERTIME_MARKER, OVERTIME_THRESHOLD_MIN, ROUND_UNIT_MIN,
};
use crate::status_export::write_status_csv;
use crate::time_utils::{
    clock_time_since, is_late, round_night_shift, round_time_default, serial_to_minutes, ClockTime,
};
use crate::workbook::{RowData, StartCell, TimesheetStore};

pub const CANCELLED_MESSAGE: &str = "キャンセルされました";

// --- Interaction Seams ---

/// Start/end pair and optional remark for a half-day paid leave.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HalfDayInput {
    pub start: ClockTime,
    pub end: ClockTime,
    pub remark: String,
}

/// Questions the engine may need answered mid-operation. `None` cancels the
/// whole operation.
pub trait InputProvider {
    fn late_reason(&self) -> Option<String>;
    fn half_day(&self) -> Option<HalfDayInput>;
    fn remark(&self, prompt: &str) -> Option<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Warning,
    Error,
}

/// Receives progress and diagnostics meant for the operator.
pub trait StatusSink {
    fn report(&self, message: &str, level: StatusLevel);
}

// --- Requests & Outcomes ---

#[derive(Debug, Clone)]
pub struct ClockInRequest {
    pub shift: String,
    pub work_mode: WorkMode,
    pub date: NaiveDate,
    /// Pre-fill the nominal start and end instead of reading the clock.
    pub assumed: bool,
    pub no_post: bool,
}

/// The target date is derived from the clock, see [`resolve_clock_out_date`].
#[derive(Debug, Clone)]
pub struct ClockOutRequest {
    pub shift: String,
    pub work_mode: WorkMode,
    pub no_post: bool,
    /// The shift began on an earlier calendar day than now.
    pub cross_midnight: bool,
    pub info: ClockOutInfo,
}

#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub dates: Vec<NaiveDate>,
    pub shift: String,
    pub work_mode: WorkMode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClockOutcome {
    /// The row was saved. `warning` carries a notification failure, if any.
    Recorded { warning: Option<String> },
    Cancelled,
    /// An unclassified failure, already reported to the status sink.
    Failed,
}

impl ClockOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ClockOutcome::Recorded { .. })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub failed: usize,
}

// --- Pure Rules ---

/// Row a clock-out belongs to, given the calendar day it happens on.
pub fn resolve_clock_out_date(today: NaiveDate, night: bool, cross_midnight: bool) -> NaiveDate {
    let days_back = match (night, cross_midnight) {
        (true, true) => 2,
        (true, false) | (false, true) => 1,
        (false, false) => 0,
    };
    today - Duration::days(days_back)
}

/// Overtime marker when more than the threshold lies between the two serials.
pub fn overtime_type(start_serial: f64, end_serial: f64) -> Option<&'static str> {
    let elapsed = serial_to_minutes(end_serial) - serial_to_minutes(start_serial);
    (elapsed > OVERTIME_THRESHOLD_MIN).then_some(OVERTIME_MARKER)
}

/// `text` as given, or `None` when it is blank.
fn non_empty(text: &str) -> Option<String> {
    (!text.trim().is_empty()).then(|| text.to_string())
}

fn fixed_row(date: NaiveDate, vacation: &FixedVacation) -> RowData {
    RowData {
        shift_label: Some(vacation.label.to_string()),
        start_time: vacation.start.map(|t| t.to_serial()),
        end_time: vacation.end.map(|t| t.to_serial()),
        remark: vacation.remark.map(str::to_string),
        ..RowData::new(date)
    }
}

fn prompted_row(date: NaiveDate, vacation: &PromptedVacation, remark: String) -> RowData {
    RowData {
        shift_label: Some(vacation.label.to_string()),
        remark: Some(remark),
        ..RowData::new(date)
    }
}

fn half_day_row(date: NaiveDate, input: &HalfDayInput) -> RowData {
    RowData {
        shift_label: Some(HALF_DAY_PAID.to_string()),
        start_time: Some(input.start.to_serial()),
        end_time: Some(input.end.to_serial()),
        remark: non_empty(&input.remark),
        ..RowData::new(date)
    }
}

fn assumed_row(date: NaiveDate, shift: RealtimeShift) -> RowData {
    RowData {
        shift_label: Some(shift.name().to_string()),
        start_time: Some(shift.nominal_start().to_serial()),
        end_time: Some(shift.nominal_end().to_serial()),
        ..RowData::new(date)
    }
}

fn batch_failure_message(date: NaiveDate, err: &AttendanceError) -> String {
    let day = date.format("%Y/%m/%d");
    match err {
        AttendanceError::TimesheetNotFound { .. } => {
            format!("{} タイムシートが見つかりませんでした。", day)
        }
        AttendanceError::TimesheetLocked { path } => {
            format!("{} Excelが開かれています: {}", day, file_name(path))
        }
        AttendanceError::TimesheetWrite(detail) => format!("{} Excel書込エラー: {}", day, detail),
        // An unreadable row is a problem with the workbook's contents.
        other => match other.kind() {
            ErrorKind::Write | ErrorKind::NotFound => {
                format!("{} Excel書込エラー: {}", day, other)
            }
            _ => format!("{} エラー: {}", day, other),
        },
    }
}

// --- Service ---

/// Applies the shift policies and records the result in the monthly workbook.
pub struct AttendanceService<S, N, C> {
    config: AppConfig,
    store: S,
    notifier: N,
    clock: C,
}

impl<S, N, C> AttendanceService<S, N, C>
where
    S: TimesheetStore,
    N: Notifier,
    C: Clock,
{
    pub fn new(config: AppConfig, store: S, notifier: N, clock: C) -> Self {
        Self {
            config,
            store,
            notifier,
            clock,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Records the start of a day. Domain errors are returned as `Err`;
    /// anything unclassified is reported to `status` and yields `Failed`.
    pub async fn clock_in(
        &self,
        request: &ClockInRequest,
        input: &dyn InputProvider,
        status: &dyn StatusSink,
    ) -> Result<ClockOutcome, AttendanceError> {
        info!(
            "Clock-in: {} ({}) for {}{}",
            request.shift,
            request.work_mode,
            request.date,
            if request.assumed { " [assumed]" } else { "" }
        );
        match self.clock_in_inner(request, input, status).await {
            Err(AttendanceError::Unexpected(e)) => {
                error!("Clock-in failed unexpectedly: {:#}", e);
                status.report(&format!("出勤処理エラー: {:#}", e), StatusLevel::Error);
                Ok(ClockOutcome::Failed)
            }
            Err(e) => {
                warn!("Clock-in for {} failed: {}", request.date, e);
                Err(e)
            }
            Ok(outcome) => Ok(outcome),
        }
    }

    async fn clock_in_inner(
        &self,
        request: &ClockInRequest,
        input: &dyn InputProvider,
        status: &dyn StatusSink,
    ) -> Result<ClockOutcome, AttendanceError> {
        let kind = ShiftKind::resolve(&request.shift)?;
        let date = request.date;

        let row = match kind {
            ShiftKind::FixedVacation(vacation) => fixed_row(date, vacation),
            ShiftKind::PromptedVacation(vacation) => match input.remark(vacation.prompt) {
                Some(remark) => prompted_row(date, vacation, remark),
                None => return Ok(self.cancelled(status)),
            },
            ShiftKind::HalfDayPaid => match input.half_day() {
                Some(half_day) => half_day_row(date, &half_day),
                None => return Ok(self.cancelled(status)),
            },
            ShiftKind::Realtime(shift) if request.assumed => assumed_row(date, shift),
            ShiftKind::Realtime(shift) => {
                let now = self.clock.now();
                if is_late(shift.name(), now) {
                    let Some(reason) = input.late_reason() else {
                        return Ok(self.cancelled(status));
                    };
                    let start = if shift.is_night() {
                        round_night_shift(now, ROUND_UNIT_MIN)
                    } else {
                        clock_time_since(now.date(), round_time_default(now))
                    };
                    info!("Late clock-in at {} recorded as {}", now.time(), start);
                    RowData {
                        shift_label: Some(LATE_MARKER.to_string()),
                        start_time: Some(start.to_serial()),
                        remark: Some(reason),
                        ..RowData::new(date)
                    }
                } else {
                    RowData {
                        shift_label: Some(shift.name().to_string()),
                        start_time: Some(shift.nominal_start().to_serial()),
                        ..RowData::new(date)
                    }
                }
            }
        };

        let live = kind.realtime().is_some() && !request.assumed && date == self.clock.today();
        let mut warning = None;
        if live {
            if let Err(e) = write_status_csv(&self.config, &request.shift, request.work_mode) {
                warn!("Status file not written: {}", e);
            }
            if !request.no_post {
                let event = NotificationEvent::ClockIn {
                    work_mode: request.work_mode,
                    comment: row.remark.clone().unwrap_or_default(),
                };
                warning = self.post(&event).await;
            }
        } else {
            debug!("Skipping status file and notification for {}", date);
        }

        let path = self.store.locate(&self.config, date)?;
        self.store.write_row(&path, &row)?;
        info!("Clock-in recorded for {} in {}", date, file_name(&path));
        Ok(ClockOutcome::Recorded { warning })
    }

    /// Records the end of a shift on the row it belongs to and flags overtime.
    pub async fn clock_out(
        &self,
        request: &ClockOutRequest,
        status: &dyn StatusSink,
    ) -> Result<ClockOutcome, AttendanceError> {
        info!(
            "Clock-out: {} ({}){}",
            request.shift,
            request.work_mode,
            if request.cross_midnight { " [cross-midnight]" } else { "" }
        );
        match self.clock_out_inner(request).await {
            Err(AttendanceError::Unexpected(e)) => {
                error!("Clock-out failed unexpectedly: {:#}", e);
                status.report(&format!("退勤処理エラー: {:#}", e), StatusLevel::Error);
                Ok(ClockOutcome::Failed)
            }
            Err(e) => {
                warn!("Clock-out failed: {}", e);
                Err(e)
            }
            Ok(outcome) => Ok(outcome),
        }
    }

    async fn clock_out_inner(
        &self,
        request: &ClockOutRequest,
    ) -> Result<ClockOutcome, AttendanceError> {
        let now = self.clock.now();
        let realtime = RealtimeShift::from_name(&request.shift);
        let night = realtime.is_some_and(|s| s.is_night());
        let shifted = night || request.cross_midnight;

        let date = resolve_clock_out_date(now.date(), night, request.cross_midnight);
        let mut end = clock_time_since(now.date(), round_time_default(now));
        if shifted {
            end = end.plus_day();
        }
        let end_serial = end.to_serial();
        debug!("Clock-out resolved to {} at {}", date, end);

        let path = self.store.locate(&self.config, date)?;

        let overtime = match self.store.read_start_time(&path, date) {
            Ok(StartCell::Serial(start)) => overtime_type(start, end_serial),
            Ok(StartCell::NotNumeric) => {
                debug!("Start time for {} is not numeric, no overtime check", date);
                None
            }
            Ok(StartCell::Blank) => {
                return Err(AttendanceError::ClockInMissing {
                    file: file_name(&path),
                    month: date.month(),
                    day: date.day(),
                });
            }
            Err(e @ AttendanceError::RowNotRecognized { .. })
            | Err(e @ AttendanceError::ClockInMissing { .. }) => return Err(e),
            Err(e) => {
                warn!("Could not read start time for overtime check: {}", e);
                None
            }
        };

        let mut warning = None;
        if !request.no_post && realtime.is_some() {
            let event = NotificationEvent::ClockOut(request.info.clone());
            warning = self.post(&event).await;
        }

        let row = RowData {
            end_time: Some(end_serial),
            overtime_type: overtime.map(str::to_string),
            remark: non_empty(&request.info.effective_comment()),
            ..RowData::new(date)
        };
        self.store.write_row(&path, &row)?;
        info!(
            "Clock-out recorded for {} at {}{}",
            date,
            end,
            if overtime.is_some() { " (overtime)" } else { "" }
        );
        Ok(ClockOutcome::Recorded { warning })
    }

    /// Writes one shift to every date. A failing date is counted and reported
    /// and does not stop the others.
    pub fn batch_write(
        &self,
        request: &BatchRequest,
        input: &dyn InputProvider,
        status: &dyn StatusSink,
    ) -> Result<BatchSummary, AttendanceError> {
        let kind = ShiftKind::resolve(&request.shift)?;
        info!(
            "Batch write: {} ({}) for {} date(s)",
            request.shift,
            request.work_mode,
            request.dates.len()
        );

        // Asked once, reused for every date.
        let template: Box<dyn Fn(NaiveDate) -> RowData> = match kind {
            ShiftKind::FixedVacation(vacation) => Box::new(move |d| fixed_row(d, vacation)),
            ShiftKind::PromptedVacation(vacation) => match input.remark(vacation.prompt) {
                Some(remark) => Box::new(move |d| prompted_row(d, vacation, remark.clone())),
                None => {
                    self.cancelled(status);
                    return Ok(BatchSummary::default());
                }
            },
            ShiftKind::HalfDayPaid => match input.half_day() {
                Some(half_day) => Box::new(move |d| half_day_row(d, &half_day)),
                None => {
                    self.cancelled(status);
                    return Ok(BatchSummary::default());
                }
            },
            ShiftKind::Realtime(shift) => Box::new(move |d| assumed_row(d, shift)),
        };

        let mut summary = BatchSummary::default();
        for &date in &request.dates {
            let row = template(date);
            let result = self
                .store
                .locate(&self.config, date)
                .and_then(|path| self.store.write_row(&path, &row));
            match result {
                Ok(()) => {
                    debug!("Batch entry written for {}", date);
                    summary.succeeded += 1;
                }
                Err(e) => {
                    warn!("Batch entry for {} failed: {}", date, e);
                    status.report(&batch_failure_message(date, &e), StatusLevel::Warning);
                    summary.failed += 1;
                }
            }
        }

        info!(
            "Batch write finished: {} succeeded, {} failed",
            summary.succeeded, summary.failed
        );
        Ok(summary)
    }

    fn cancelled(&self, status: &dyn StatusSink) -> ClockOutcome {
        info!("Operation cancelled by the operator");
        status.report(CANCELLED_MESSAGE, StatusLevel::Info);
        ClockOutcome::Cancelled
    }

    /// Sends `event`, turning a failure into a warning for the caller.
    async fn post(&self, event: &NotificationEvent) -> Option<String> {
        match self.notifier.notify(&self.config, event).await {
            Ok(()) => None,
            Err(e) => {
                warn!("Notification failed: {}", e);
                Some(format!("Teams投稿エラー: {}", e))
            }
        }
    }
}

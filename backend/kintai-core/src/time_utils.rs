// src/time_utils.rs

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

use crate::shift_catalog::{RealtimeShift, LATE_TOLERANCE_MIN, ROUND_UNIT_MIN};

const MINUTES_PER_DAY: i64 = 24 * 60;
const WEEKDAYS_JP: [&str; 7] = ["月", "火", "水", "木", "金", "土", "日"];

// --- Clock Time (hours may exceed 23) ---

/// An hour/minute pair on an open-ended scale. `31:30` is 07:30 on the day
/// after the shift started, which is how night-shift end times are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClockTime {
    pub hours: u32,
    pub minutes: u32,
}

impl ClockTime {
    pub const fn new(hours: u32, minutes: u32) -> Self {
        Self { hours, minutes }
    }

    pub fn total_minutes(&self) -> i64 {
        i64::from(self.hours) * 60 + i64::from(self.minutes)
    }

    pub fn to_serial(&self) -> f64 {
        time_to_serial(self.hours, self.minutes)
    }

    /// Same wall-clock time, one day later on the open-ended scale.
    pub fn plus_day(&self) -> Self {
        Self::new(self.hours + 24, self.minutes)
    }

    fn from_total_minutes(total: i64) -> Self {
        let total = total.max(0);
        Self::new((total / 60) as u32, (total % 60) as u32)
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hours, self.minutes)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid clock time '{0}', expected HH:MM")]
pub struct ParseClockTimeError(String);

impl FromStr for ClockTime {
    type Err = ParseClockTimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseClockTimeError(s.to_string());
        let (h, m) = s.trim().split_once(':').ok_or_else(err)?;
        let hours: u32 = h.parse().map_err(|_| err())?;
        let minutes: u32 = m.parse().map_err(|_| err())?;
        if minutes >= 60 {
            return Err(err());
        }
        Ok(Self::new(hours, minutes))
    }
}

impl From<NaiveTime> for ClockTime {
    fn from(t: NaiveTime) -> Self {
        Self::new(t.hour(), t.minute())
    }
}

// --- Rounding ---

/// Round half-up to the nearest multiple of `unit`.
fn round_minutes(total: i64, unit: i64) -> i64 {
    let unit = unit.max(1);
    ((total * 2 + unit) / (unit * 2)) * unit
}

/// Drop seconds and round the time of day to the nearest `unit` minutes,
/// half-up. Rounding past 23:59 moves into the next day.
pub fn round_time(dt: NaiveDateTime, unit: u32) -> NaiveDateTime {
    let minute_of_day = i64::from(dt.hour()) * 60 + i64::from(dt.minute());
    let rounded = round_minutes(minute_of_day, i64::from(unit));
    dt.date().and_time(NaiveTime::MIN) + Duration::minutes(rounded)
}

/// [`round_time`] with the standard 15 minute unit.
pub fn round_time_default(dt: NaiveDateTime) -> NaiveDateTime {
    round_time(dt, ROUND_UNIT_MIN)
}

/// Rounding for a night shift that started the previous evening. Anything
/// before 22:00 is taken to be past midnight and expressed as 24+ hours.
pub fn round_night_shift(dt: NaiveDateTime, unit: u32) -> ClockTime {
    let mut hours = i64::from(dt.hour());
    if hours < 22 {
        hours += 24;
    }
    let total = hours * 60 + i64::from(dt.minute());
    ClockTime::from_total_minutes(round_minutes(total, i64::from(unit)))
}

/// Minutes of `later` counted from midnight of `anchor`. Spills into 24+ hours
/// when `later` falls on a following day.
pub fn clock_time_since(anchor: NaiveDate, later: NaiveDateTime) -> ClockTime {
    let minutes = (later - anchor.and_time(NaiveTime::MIN)).num_minutes();
    ClockTime::from_total_minutes(minutes)
}

// --- Excel serials ---

/// Fraction of a day, `0.0` = 00:00 and `1.0` = 24:00. Hours above 24 are
/// allowed and produce values above 1.
pub fn time_to_serial(hour: u32, minute: u32) -> f64 {
    (f64::from(hour) * 60.0 + f64::from(minute)) / MINUTES_PER_DAY as f64
}

/// Whole minutes represented by a serial, rounded to absorb float noise.
pub fn serial_to_minutes(serial: f64) -> i64 {
    (serial * MINUTES_PER_DAY as f64).round() as i64
}

// --- Lateness ---

/// Whether `now` is strictly past the shift's nominal start plus the
/// tolerance. Shifts without a nominal start are never late.
pub fn is_late(shift_name: &str, now: NaiveDateTime) -> bool {
    let Some(shift) = RealtimeShift::from_name(shift_name) else {
        return false;
    };
    let start = shift.nominal_start();

    if shift == RealtimeShift::Night {
        let mut anchor = now.date();
        if now.hour() < 12 {
            // Still inside the window of the shift that began yesterday evening.
            anchor = anchor.pred_opt().unwrap_or(anchor);
        }
        let limit = anchor.and_time(NaiveTime::MIN)
            + Duration::minutes(start.total_minutes() + i64::from(LATE_TOLERANCE_MIN));
        now > limit
    } else {
        let current = i64::from(now.hour()) * 60 + i64::from(now.minute());
        current > start.total_minutes() + i64::from(LATE_TOLERANCE_MIN)
    }
}

// --- Formatting ---

/// `2025年01月15日（水）`
pub fn format_date_jp(d: NaiveDate) -> String {
    format!(
        "{}年{:02}月{:02}日（{}）",
        d.year(),
        d.month(),
        d.day(),
        WEEKDAYS_JP[d.weekday().num_days_from_monday() as usize]
    )
}

/// `1月15日(水)`
pub fn format_date_short(d: NaiveDate) -> String {
    format!(
        "{}月{}日({})",
        d.month(),
        d.day(),
        WEEKDAYS_JP[d.weekday().num_days_from_monday() as usize]
    )
}

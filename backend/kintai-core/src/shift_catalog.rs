// src/shift_catalog.rs

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AttendanceError;
use crate::time_utils::ClockTime;

// --- Policy Constants ---

pub const LATE_TOLERANCE_MIN: u32 = 10;
pub const ROUND_UNIT_MIN: u32 = 15;

/// Shift label written instead of the shift name when clocking in late.
pub const LATE_MARKER: &str = "遅刻";
/// Overtime-type text written when a day runs past the threshold.
pub const OVERTIME_MARKER: &str = "客先指示";
/// Elapsed minutes a day may span before it counts as overtime.
pub const OVERTIME_THRESHOLD_MIN: i64 = 9 * 60;

pub const HALF_DAY_PAID: &str = "0.5日有給";

// --- Work Mode ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum WorkMode {
    #[serde(rename = "リモート")]
    Remote,
    #[default]
    #[serde(rename = "出社")]
    Office,
}

impl WorkMode {
    pub fn label(&self) -> &'static str {
        match self {
            WorkMode::Remote => "リモート",
            WorkMode::Office => "出社",
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, WorkMode::Remote)
    }
}

impl fmt::Display for WorkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for WorkMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "リモート" | "remote" => Ok(WorkMode::Remote),
            "出社" | "office" => Ok(WorkMode::Office),
            other => Err(format!("unknown work mode '{}'", other)),
        }
    }
}

// --- Real-time Shifts ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RealtimeShift {
    Day,
    Early,
    Late,
    Night,
}

impl RealtimeShift {
    pub const ALL: [RealtimeShift; 4] = [
        RealtimeShift::Day,
        RealtimeShift::Early,
        RealtimeShift::Late,
        RealtimeShift::Night,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            RealtimeShift::Day => "日勤",
            RealtimeShift::Early => "早番",
            RealtimeShift::Late => "遅番",
            RealtimeShift::Night => "深夜",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.name() == name)
    }

    pub fn nominal_start(&self) -> ClockTime {
        match self {
            RealtimeShift::Day => ClockTime::new(10, 0),
            RealtimeShift::Early => ClockTime::new(7, 0),
            RealtimeShift::Late => ClockTime::new(14, 30),
            RealtimeShift::Night => ClockTime::new(22, 30),
        }
    }

    /// Night ends on the 24+ hour scale.
    pub fn nominal_end(&self) -> ClockTime {
        match self {
            RealtimeShift::Day => ClockTime::new(19, 0),
            RealtimeShift::Early => ClockTime::new(16, 0),
            RealtimeShift::Late => ClockTime::new(23, 30),
            RealtimeShift::Night => ClockTime::new(31, 30),
        }
    }

    pub fn is_night(&self) -> bool {
        matches!(self, RealtimeShift::Night)
    }
}

// --- Vacations ---

#[derive(Debug, PartialEq, Eq)]
pub struct FixedVacation {
    pub name: &'static str,
    pub label: &'static str,
    pub start: Option<ClockTime>,
    pub end: Option<ClockTime>,
    pub remark: Option<&'static str>,
}

#[derive(Debug, PartialEq, Eq)]
pub struct PromptedVacation {
    pub name: &'static str,
    pub label: &'static str,
    pub prompt: &'static str,
}

pub static FIXED_VACATIONS: [FixedVacation; 4] = [
    FixedVacation {
        name: "シフト休",
        label: "シフト休",
        start: None,
        end: None,
        remark: None,
    },
    FixedVacation {
        name: "健康診断(半日)",
        label: "0.5日有給",
        start: Some(ClockTime::new(14, 0)),
        end: Some(ClockTime::new(18, 0)),
        remark: Some("午後健康診断+0.5有給"),
    },
    FixedVacation {
        name: "1日人間ドック",
        label: "日勤",
        start: Some(ClockTime::new(10, 0)),
        end: Some(ClockTime::new(18, 0)),
        remark: Some("1日人間ドック"),
    },
    FixedVacation {
        name: "慶弔休暇",
        label: "慶弔休暇",
        start: None,
        end: None,
        remark: None,
    },
];

pub static PROMPTED_VACATIONS: [PromptedVacation; 2] = [
    PromptedVacation {
        name: "振休",
        label: "シフト休",
        prompt: "振休の詳細を入力してください:　(例)「12/25出社分」",
    },
    PromptedVacation {
        name: "1.0日有給",
        label: "1.0日有給",
        prompt: "有給の詳細を入力してください:　(例)「体調不良の為」「私用の為」",
    },
];

// --- Resolution ---

/// Which policy a shift name falls under. Each name resolves to exactly one
/// variant, or to [`AttendanceError::UnknownShiftType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftKind {
    FixedVacation(&'static FixedVacation),
    PromptedVacation(&'static PromptedVacation),
    HalfDayPaid,
    Realtime(RealtimeShift),
}

impl ShiftKind {
    pub fn resolve(name: &str) -> Result<Self, AttendanceError> {
        if let Some(v) = FIXED_VACATIONS.iter().find(|v| v.name == name) {
            return Ok(ShiftKind::FixedVacation(v));
        }
        if let Some(v) = PROMPTED_VACATIONS.iter().find(|v| v.name == name) {
            return Ok(ShiftKind::PromptedVacation(v));
        }
        if name == HALF_DAY_PAID {
            return Ok(ShiftKind::HalfDayPaid);
        }
        RealtimeShift::from_name(name)
            .map(ShiftKind::Realtime)
            .ok_or_else(|| AttendanceError::UnknownShiftType(name.to_string()))
    }

    pub fn realtime(&self) -> Option<RealtimeShift> {
        match self {
            ShiftKind::Realtime(shift) => Some(*shift),
            _ => None,
        }
    }
}

/// Every name the catalog knows, real-time shifts first. Used as the default
/// `shift_types` list in the settings file.
pub fn all_shift_names() -> Vec<String> {
    RealtimeShift::ALL
        .iter()
        .map(|s| s.name())
        .chain(FIXED_VACATIONS.iter().map(|v| v.name))
        .chain(PROMPTED_VACATIONS.iter().map(|v| v.name))
        .chain(std::iter::once(HALF_DAY_PAID))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn partitions_are_disjoint() {
        let names = all_shift_names();
        let unique: HashSet<_> = names.iter().collect();
        assert_eq!(names.len(), unique.len());
        for name in &names {
            assert!(ShiftKind::resolve(name).is_ok(), "{name} should resolve");
        }
    }

    #[test]
    fn resolves_each_partition() {
        assert!(matches!(
            ShiftKind::resolve("シフト休"),
            Ok(ShiftKind::FixedVacation(v)) if v.label == "シフト休"
        ));
        assert!(matches!(
            ShiftKind::resolve("振休"),
            Ok(ShiftKind::PromptedVacation(v)) if v.label == "シフト休"
        ));
        assert!(matches!(
            ShiftKind::resolve("0.5日有給"),
            Ok(ShiftKind::HalfDayPaid)
        ));
        assert!(matches!(
            ShiftKind::resolve("深夜"),
            Ok(ShiftKind::Realtime(RealtimeShift::Night))
        ));
    }

    #[test]
    fn unknown_name_is_an_error() {
        match ShiftKind::resolve("夜勤") {
            Err(AttendanceError::UnknownShiftType(name)) => assert_eq!(name, "夜勤"),
            other => panic!("expected UnknownShiftType, got {:?}", other),
        }
    }

    #[test]
    fn night_shift_ends_past_midnight() {
        let night = RealtimeShift::Night;
        assert!(night.nominal_end() > night.nominal_start());
        assert_eq!(night.nominal_end().to_string(), "31:30");
    }

    #[test]
    fn work_mode_parses_both_spellings() {
        assert_eq!("remote".parse::<WorkMode>(), Ok(WorkMode::Remote));
        assert_eq!("出社".parse::<WorkMode>(), Ok(WorkMode::Office));
        assert!("home".parse::<WorkMode>().is_err());
    }
}

// src/row_locator.rs

use std::collections::HashMap;

use calamine::{Data, Range};

// --- Timesheet Layout (1-based, as shown in Excel) ---

pub const FIRST_DATA_ROW: u32 = 18;
pub const LAST_DATA_ROW: u32 = 48;

pub const COL_DAY: u32 = 3; // C
pub const COL_SHIFT_LABEL: u32 = 5; // E
pub const COL_START: u32 = 6; // F
pub const COL_END: u32 = 7; // G
pub const COL_OVERTIME: u32 = 11; // K
pub const COL_REMARK: u32 = 12; // L

/// Day whose row anchors the last days of the month.
const ANCHOR_DAY: u32 = 28;

// --- Cell Access ---

#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Number(f64),
    Text(String),
}

impl CellValue {
    /// Numbers, and text that parses as a number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            CellValue::Text(s) => s.trim().parse::<f64>().ok(),
            CellValue::Empty => None,
        }
    }

    fn as_day_number(&self) -> Option<i64> {
        match self {
            CellValue::Number(n) if n.is_finite() => Some(n.trunc() as i64),
            CellValue::Text(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            CellValue::Number(_) => false,
        }
    }
}

/// Read access to a worksheet by 1-based row and column.
pub trait CellGrid {
    fn cell(&self, row: u32, col: u32) -> CellValue;
}

impl CellGrid for Range<Data> {
    fn cell(&self, row: u32, col: u32) -> CellValue {
        if row == 0 || col == 0 {
            return CellValue::Empty;
        }
        match self.get_value((row - 1, col - 1)) {
            None | Some(Data::Empty) => CellValue::Empty,
            Some(Data::Int(i)) => CellValue::Number(*i as f64),
            Some(Data::Float(f)) => CellValue::Number(*f),
            Some(Data::DateTime(dt)) => CellValue::Number(dt.as_f64()),
            Some(Data::Bool(b)) => CellValue::Text(b.to_string()),
            Some(Data::String(s)) | Some(Data::DateTimeIso(s)) | Some(Data::DurationIso(s)) => {
                CellValue::Text(s.clone())
            }
            Some(Data::Error(e)) => CellValue::Text(format!("{:?}", e)),
        }
    }
}

/// Sparse grid keyed by `(row, col)`.
impl CellGrid for HashMap<(u32, u32), CellValue> {
    fn cell(&self, row: u32, col: u32) -> CellValue {
        self.get(&(row, col)).cloned().unwrap_or(CellValue::Empty)
    }
}

// --- Row Lookup ---

fn scan_for_day<G: CellGrid + ?Sized>(grid: &G, day: u32) -> Option<u32> {
    (FIRST_DATA_ROW..=LAST_DATA_ROW)
        .find(|&row| grid.cell(row, COL_DAY).as_day_number() == Some(i64::from(day)))
}

/// Row holding `day` in the day-number column.
///
/// Days up to 28 are matched directly. Days 29 to 31 are placed right after
/// the row of day 28, whatever the cells there contain, because the monthly
/// template does not keep those cells as plain numbers.
pub fn row_for_day<G: CellGrid + ?Sized>(grid: &G, day: u32) -> Option<u32> {
    match day {
        1..=ANCHOR_DAY => scan_for_day(grid, day),
        29..=31 => scan_for_day(grid, ANCHOR_DAY).map(|anchor| anchor + (day - ANCHOR_DAY)),
        _ => None,
    }
}

// src/holidays.rs

use std::collections::BTreeSet;

use chrono::{Datelike, Duration, NaiveDate, Weekday};

// --- Japanese Public Holidays ---

const FIXED_HOLIDAYS: [(u32, u32); 10] = [
    (1, 1),   // 元日
    (2, 11),  // 建国記念の日
    (2, 23),  // 天皇誕生日
    (4, 29),  // 昭和の日
    (5, 3),   // 憲法記念日
    (5, 4),   // みどりの日
    (5, 5),   // こどもの日
    (8, 11),  // 山の日
    (11, 3),  // 文化の日
    (11, 23), // 勤労感謝の日
];

/// (month, n): the n-th Monday of the month.
const HAPPY_MONDAYS: [(u32, u32); 4] = [(1, 2), (7, 3), (9, 3), (10, 2)];

fn equinox_day(year: i32, regimes: [f64; 3]) -> u32 {
    let elapsed = f64::from(year - 1980);
    let (base, leap_offset) = if year <= 1979 {
        (regimes[0], (year - 1983) / 4)
    } else if year <= 2099 {
        (regimes[1], (year - 1980) / 4)
    } else {
        (regimes[2], (year - 1980) / 4)
    };
    (base + 0.242194 * elapsed - f64::from(leap_offset)) as u32
}

fn vernal_equinox(year: i32) -> u32 {
    equinox_day(year, [20.8357, 20.8431, 21.851])
}

fn autumnal_equinox(year: i32) -> u32 {
    equinox_day(year, [23.2588, 23.2488, 24.2488])
}

fn nth_weekday(year: i32, month: u32, weekday: Weekday, n: u8) -> Option<NaiveDate> {
    NaiveDate::from_weekday_of_month_opt(year, month, weekday, n)
}

/// Every holiday in `year` before substitution.
fn base_holidays(year: i32) -> BTreeSet<NaiveDate> {
    let mut holidays: BTreeSet<NaiveDate> = FIXED_HOLIDAYS
        .iter()
        .filter_map(|&(m, d)| NaiveDate::from_ymd_opt(year, m, d))
        .collect();

    holidays.extend(NaiveDate::from_ymd_opt(year, 3, vernal_equinox(year)));
    holidays.extend(NaiveDate::from_ymd_opt(year, 9, autumnal_equinox(year)));

    for &(month, n) in &HAPPY_MONDAYS {
        holidays.extend(nth_weekday(year, month, Weekday::Mon, n as u8));
    }
    holidays
}

/// Holidays falling in the given month, substitute holidays (振替休日) included.
///
/// A holiday on a Sunday moves its substitute to the next day that is neither
/// a holiday nor an already assigned substitute.
pub fn get_holidays(year: i32, month: u32) -> BTreeSet<NaiveDate> {
    let holidays = base_holidays(year);

    let mut substitutes = BTreeSet::new();
    for day in holidays.iter().filter(|d| d.weekday() == Weekday::Sun) {
        let mut candidate = *day + Duration::days(1);
        while holidays.contains(&candidate) || substitutes.contains(&candidate) {
            candidate += Duration::days(1);
        }
        substitutes.insert(candidate);
    }

    holidays
        .into_iter()
        .chain(substitutes)
        .filter(|d| d.year() == year && d.month() == month)
        .collect()
}

pub fn is_holiday(date: NaiveDate) -> bool {
    get_holidays(date.year(), date.month()).contains(&date)
}

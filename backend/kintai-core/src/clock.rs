// src/clock.rs

use std::sync::{Arc, Mutex};

use chrono::{Duration, Local, NaiveDate, NaiveDateTime};
use tracing::{info, warn};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Source of "now" for the attendance engine.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;

    fn today(&self) -> NaiveDate {
        self.now().date()
    }
}

// --- System Clock ---

/// Wall clock, optionally pinned to a fixed date. With a pinned date, `now`
/// keeps the real time of day.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock {
    test_date: Option<NaiveDate>,
}

impl SystemClock {
    pub fn new() -> Self {
        Self { test_date: None }
    }

    /// Parses an override such as `2026-02-10`. Blank or invalid values leave
    /// the clock on the real date.
    pub fn with_override(raw: Option<&str>) -> Self {
        let test_date = raw.map(str::trim).filter(|s| !s.is_empty()).and_then(|s| {
            match NaiveDate::parse_from_str(s, DATE_FORMAT) {
                Ok(date) => {
                    info!("Test date override active: {}", date);
                    Some(date)
                }
                Err(e) => {
                    warn!("Ignoring invalid test date '{}': {}", s, e);
                    None
                }
            }
        });
        Self { test_date }
    }

    pub fn test_date(&self) -> Option<NaiveDate> {
        self.test_date
    }
}

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        let real = Local::now().naive_local();
        match self.test_date {
            Some(date) => date.and_time(real.time()),
            None => real,
        }
    }

    fn today(&self) -> NaiveDate {
        self.test_date
            .unwrap_or_else(|| Local::now().date_naive())
    }
}

// --- Test Clock ---

/// Settable clock shared between clones.
#[derive(Debug, Clone)]
pub struct TestClock {
    current_time: Arc<Mutex<NaiveDateTime>>,
}

impl TestClock {
    pub fn at(dt: NaiveDateTime) -> Self {
        Self {
            current_time: Arc::new(Mutex::new(dt)),
        }
    }

    /// `"%Y-%m-%d %H:%M:%S"`
    pub fn parse(datetime_str: &str) -> Result<Self, chrono::ParseError> {
        NaiveDateTime::parse_from_str(datetime_str, "%Y-%m-%d %H:%M:%S").map(Self::at)
    }

    pub fn set_time(&self, dt: NaiveDateTime) {
        *self.lock() = dt;
    }

    pub fn advance(&self, duration: Duration) {
        *self.lock() += duration;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, NaiveDateTime> {
        self.current_time
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Clock for TestClock {
    fn now(&self) -> NaiveDateTime {
        *self.lock()
    }
}

//! Core data structures shared by parsers, the pipeline, and consumers.
//!
//! Defines the cell values parsers emit, the calendar date tuple every
//! dated product carries, and the run statistics the orchestrator reports.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Leap year that places day 366 and February 29 of simulation years
const LEAP_PROXY_YEAR: i32 = 2000;

/// A single cell produced by a parser, prior to columnar conversion
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Text(String),
    Null,
}

/// One parsed row, positionally aligned with the product schema
pub type Row = Vec<Value>;

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value as i64)
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Int(value as i64)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<Option<f64>> for Value {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Value::Null, Value::Float)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(v) => write!(f, "{}", v),
            Value::Null => write!(f, "null"),
        }
    }
}

/// Calendar date as the interchange products expose it
///
/// `julian` is the 1-based day of year and always agrees with
/// `(year, month, day_of_month)`. The `from_*` constructors reject
/// impossible dates; the `resolve_*` ones also admit simulation-year
/// leap days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DateParts {
    pub year: i32,
    pub month: u32,
    pub day_of_month: u32,
    pub julian: u32,
}

impl DateParts {
    /// Build from a calendar date
    pub fn from_ymd(year: i32, month: u32, day_of_month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day_of_month).map(Self::from_date)
    }

    /// Build from the simulator's year / day-of-year pair
    pub fn from_year_julian(year: i32, julian: u32) -> Option<Self> {
        NaiveDate::from_yo_opt(year, julian).map(Self::from_date)
    }

    /// Like [`Self::from_year_julian`], but day 366 of a year chrono
    /// calls common is placed as in a leap year
    ///
    /// Simulation years (1..N) follow the climate's calendar rather than
    /// the proleptic one, so a leap day there is valid input.
    pub fn resolve_year_julian(year: i32, julian: u32) -> Option<Self> {
        Self::from_year_julian(year, julian).or_else(|| {
            NaiveDate::from_yo_opt(LEAP_PROXY_YEAR, julian).map(|date| Self {
                year,
                ..Self::from_date(date)
            })
        })
    }

    /// Like [`Self::from_ymd`], but February 29 is accepted in any year
    pub fn resolve_ymd(year: i32, month: u32, day_of_month: u32) -> Option<Self> {
        Self::from_ymd(year, month, day_of_month).or_else(|| {
            NaiveDate::from_ymd_opt(LEAP_PROXY_YEAR, month, day_of_month).map(|date| Self {
                year,
                ..Self::from_date(date)
            })
        })
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
            day_of_month: date.day(),
            julian: date.ordinal(),
        }
    }

    pub fn to_date(self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, self.day_of_month)
    }

    /// Water year: October through December belong to the following year
    pub fn water_year(&self) -> i32 {
        water_year(self.year, self.month)
    }

    /// Common date cells in schema order: year, month, day_of_month, julian, day, water_year
    pub fn cells(&self) -> [Value; 6] {
        [
            Value::from(self.year),
            Value::from(self.month),
            Value::from(self.day_of_month),
            Value::from(self.julian),
            Value::from(self.julian),
            Value::from(self.water_year()),
        ]
    }
}

pub fn water_year(year: i32, month: u32) -> i32 {
    if month < 10 { year } else { year + 1 }
}

pub fn days_in_year(year: i32) -> i64 {
    if NaiveDate::from_ymd_opt(year, 2, 29).is_some() { 366 } else { 365 }
}

/// Statistics for a single artifact write
#[derive(Debug, Clone, Default)]
pub struct ArtifactStats {
    pub files_processed: usize,
    pub rows_written: usize,
    pub output_path: PathBuf,
}

/// Statistics for an orchestrator run
#[derive(Debug, Default)]
pub struct RunSummary {
    pub artifacts: Vec<ArtifactStats>,
    pub interchange_dir: PathBuf,
    pub refreshed: bool,
    pub processing_time_ms: u128,
}

impl RunSummary {
    pub fn total_rows(&self) -> usize {
        self.artifacts.iter().map(|a| a.rows_written).sum()
    }

    pub fn total_files(&self) -> usize {
        self.artifacts.iter().map(|a| a.files_processed).sum()
    }

    pub fn merge(&mut self, other: RunSummary) {
        self.artifacts.extend(other.artifacts);
        self.refreshed |= other.refreshed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_julian_is_consistent_with_calendar() {
        let date = DateParts::from_ymd(2001, 3, 1).unwrap();
        assert_eq!(date.julian, 60);

        let leap = DateParts::from_year_julian(2000, 60).unwrap();
        assert_eq!((leap.month, leap.day_of_month), (2, 29));
    }

    #[test]
    fn test_water_year_boundary() {
        assert_eq!(DateParts::from_ymd(2000, 9, 30).unwrap().water_year(), 2000);
        assert_eq!(DateParts::from_ymd(2000, 10, 1).unwrap().water_year(), 2001);
    }

    #[test]
    fn test_invalid_dates_rejected() {
        assert!(DateParts::from_ymd(2001, 2, 29).is_none());
        assert!(DateParts::from_year_julian(2001, 366).is_none());
        assert!(DateParts::from_year_julian(2001, 0).is_none());
    }

    #[test]
    fn test_simulation_leap_days_resolve() {
        let day = DateParts::resolve_year_julian(1, 366).unwrap();
        assert_eq!((day.year, day.month, day.day_of_month, day.julian), (1, 12, 31, 366));

        let leap = DateParts::resolve_ymd(1, 2, 29).unwrap();
        assert_eq!((leap.year, leap.month, leap.day_of_month, leap.julian), (1, 2, 29, 60));

        // valid dates keep their own calendar
        assert_eq!(DateParts::resolve_ymd(1, 3, 1).unwrap().julian, 60);
        assert_eq!(DateParts::resolve_year_julian(2001, 59), DateParts::from_ymd(2001, 2, 28));
        assert!(DateParts::resolve_year_julian(1, 367).is_none());
        assert!(DateParts::resolve_ymd(1, 2, 30).is_none());
    }

    #[test]
    fn test_days_in_year() {
        assert_eq!(days_in_year(2000), 366);
        assert_eq!(days_in_year(1900), 365);
        assert_eq!(days_in_year(2004), 366);
    }

    #[test]
    fn test_date_cells_order() {
        let cells = DateParts::from_ymd(2000, 12, 31).unwrap().cells();
        assert_eq!(cells[0], Value::Int(2000));
        assert_eq!(cells[1], Value::Int(12));
        assert_eq!(cells[2], Value::Int(31));
        assert_eq!(cells[3], Value::Int(366));
        assert_eq!(cells[4], Value::Int(366));
        assert_eq!(cells[5], Value::Int(2001));
    }
}

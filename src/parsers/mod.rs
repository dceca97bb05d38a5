//! Parsers for WEPP hillslope and watershed text products.
//!
//! Every parser is a pure function of one input path (plus the sentinel
//! set and the simulation start year) returning rows aligned with its
//! product schema.

pub mod hillslope;
pub mod pass_record;
pub mod watershed;

use crate::error::{InterchangeError, Result};
use crate::header::NumericLine;
use crate::models::{DateParts, days_in_year};
use crate::pipeline::discovery::wepp_id_from_path;

use std::path::Path;
use tracing::warn;

/// Hillslope id from an `H<id>.<kind>.dat` path
pub(crate) fn hillslope_id(path: &Path) -> Result<u32> {
    wepp_id_from_path(path).ok_or_else(|| {
        InterchangeError::malformed(
            path,
            0,
            "filename does not carry a hillslope id (expected H<id>.<kind>.dat)",
        )
    })
}

/// Calendar year for a raw year column
///
/// Values below `start_year` are simulation years counted from 1.
pub fn calendar_year(raw: i32, start_year: Option<i32>) -> i32 {
    match start_year {
        Some(start) if raw < start => start + raw - 1,
        _ => raw,
    }
}

/// Date from year and day-of-year columns of `row`
///
/// Leap days of simulation years are accepted, as in
/// [`DateParts::resolve_year_julian`].
pub(crate) fn date_from_julian(
    path: &Path,
    row: &NumericLine,
    year: i32,
    julian_idx: usize,
) -> Result<DateParts> {
    let julian = row.int(julian_idx, path)?;
    u32::try_from(julian)
        .ok()
        .and_then(|j| DateParts::resolve_year_julian(year, j))
        .ok_or_else(|| {
            InterchangeError::malformed(
                path,
                row.line_no,
                format!("day {} is not a day of year {}", julian, year),
            )
        })
}

/// Date from month and day-of-month columns of `row`
pub(crate) fn date_from_month_day(
    path: &Path,
    row: &NumericLine,
    year: i32,
    month_idx: usize,
    day_idx: usize,
) -> Result<DateParts> {
    let month = row.int(month_idx, path)?;
    let day = row.int(day_idx, path)?;
    u32::try_from(month)
        .ok()
        .zip(u32::try_from(day).ok())
        .and_then(|(m, d)| DateParts::resolve_ymd(year, m, d))
        .ok_or_else(|| {
            InterchangeError::malformed(
                path,
                row.line_no,
                format!("invalid date {}-{:02}-{:02}", year, month, day),
            )
        })
}

/// Running day counter for daily soil products
///
/// The index counts days from January 1 of the first year seen, so it
/// equals `julian` for a single-year file. Files that step back in time
/// restart the count at that row's year and the reset is reported once.
#[derive(Debug, Default)]
pub(crate) struct SimDayIndex {
    base_year: Option<i32>,
    last: Option<DateParts>,
    /// Years seen with a day 366, whatever chrono thinks of them
    long_years: Vec<i32>,
    warned: bool,
}

impl SimDayIndex {
    pub(crate) fn next(&mut self, path: &Path, date: DateParts) -> i64 {
        let base_year = match (self.base_year, self.last) {
            (Some(base), Some(last)) if (date.year, date.julian) >= (last.year, last.julian) => {
                base
            }
            (Some(_), Some(last)) => {
                if !self.warned {
                    warn!(
                        "{}: day index resets at year {} day {} (after year {} day {})",
                        path.display(),
                        date.year,
                        date.julian,
                        last.year,
                        last.julian
                    );
                    self.warned = true;
                }
                date.year
            }
            _ => date.year,
        };
        self.base_year = Some(base_year);
        self.last = Some(date);
        if date.julian == 366 && !self.long_years.contains(&date.year) {
            self.long_years.push(date.year);
        }

        let elapsed: i64 = (base_year..date.year)
            .map(|year| if self.long_years.contains(&year) { 366 } else { days_in_year(year) })
            .sum();
        elapsed + date.julian as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_calendar_year() {
        assert_eq!(calendar_year(1, Some(2000)), 2000);
        assert_eq!(calendar_year(6, Some(2000)), 2005);
        assert_eq!(calendar_year(2003, Some(2000)), 2003);
        assert_eq!(calendar_year(3, None), 3);
    }

    #[test]
    fn test_hillslope_id() {
        assert_eq!(hillslope_id(Path::new("H7.soil.dat")).unwrap(), 7);
        assert!(hillslope_id(Path::new("soil.dat")).is_err());
    }

    #[test]
    fn test_sim_day_index_is_monotone_across_years() {
        let path = PathBuf::from("H1.soil.dat");
        let mut index = SimDayIndex::default();
        let days: Vec<i64> = [(1, 1), (1, 365), (2, 1), (2, 2)]
            .into_iter()
            .map(|(y, j)| index.next(&path, DateParts::from_year_julian(y, j).unwrap()))
            .collect();
        // year 1 is not a leap year
        assert_eq!(days, vec![1, 365, 366, 367]);
    }

    #[test]
    fn test_sim_day_index_keeps_reset() {
        let path = PathBuf::from("H1.soil.dat");
        let mut index = SimDayIndex::default();
        assert_eq!(index.next(&path, DateParts::from_year_julian(2000, 10).unwrap()), 10);
        assert_eq!(index.next(&path, DateParts::from_year_julian(2001, 1).unwrap()), 367);
        assert_eq!(index.next(&path, DateParts::from_year_julian(2000, 5).unwrap()), 5);
        assert_eq!(index.next(&path, DateParts::from_year_julian(2000, 6).unwrap()), 6);
    }

    #[test]
    fn test_sim_day_index_spans_simulation_leap_day() {
        let path = PathBuf::from("H1.soil.dat");
        let mut index = SimDayIndex::default();
        let days: Vec<i64> = [(1, 365), (1, 366), (2, 1)]
            .into_iter()
            .map(|(y, j)| index.next(&path, DateParts::resolve_year_julian(y, j).unwrap()))
            .collect();
        assert_eq!(days, vec![365, 366, 367]);
    }

    #[test]
    fn test_same_day_rows_share_index() {
        let path = PathBuf::from("H1.soil.dat");
        let mut index = SimDayIndex::default();
        let date = DateParts::from_year_julian(2000, 3).unwrap();
        assert_eq!(index.next(&path, date), 3);
        assert_eq!(index.next(&path, date), 3);
    }
}

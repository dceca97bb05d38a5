//! Inclusive date-range filtering for frames that carry calendar columns.
//!
//! Dates are compared as `(year, month, day)` triples built from three
//! integer component columns, so frames never need a materialized date
//! column. A filter that keeps every row hands back the input frame itself.

use crate::error::Result;

use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use std::borrow::Cow;
use tracing::debug;

/// One inclusive boundary of a date range
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct DateBound {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

impl DateBound {
    pub const fn new(year: i32, month: u32, day: u32) -> Self {
        Self { year, month, day }
    }
}

impl From<NaiveDate> for DateBound {
    fn from(date: NaiveDate) -> Self {
        Self::new(date.year(), date.month(), date.day())
    }
}

impl From<(i32, u32, u32)> for DateBound {
    fn from((year, month, day): (i32, u32, u32)) -> Self {
        Self::new(year, month, day)
    }
}

/// Names of the component columns a frame carries its date in
#[derive(Debug, Clone)]
pub struct DateColumns {
    pub year: String,
    pub month: String,
    pub day: String,
}

impl Default for DateColumns {
    fn default() -> Self {
        Self {
            year: "year".to_string(),
            month: "month".to_string(),
            day: "day_of_month".to_string(),
        }
    }
}

impl DateColumns {
    pub fn new(year: &str, month: &str, day: &str) -> Self {
        Self {
            year: year.to_string(),
            month: month.to_string(),
            day: day.to_string(),
        }
    }
}

/// `(y, m, d) >= bound` (or `<=` when `upper`), lexicographically
fn bound_expr(columns: &DateColumns, bound: DateBound, upper: bool) -> Expr {
    let year = col(columns.year.as_str());
    let month = col(columns.month.as_str());
    let day = col(columns.day.as_str());
    let (y, m, d) = (lit(bound.year), lit(bound.month as i32), lit(bound.day as i32));

    let (year_past, month_past, day_ok) = if upper {
        (year.clone().lt(y.clone()), month.clone().lt(m.clone()), day.lt_eq(d))
    } else {
        (year.clone().gt(y.clone()), month.clone().gt(m.clone()), day.gt_eq(d))
    };

    year_past.or(year.eq(y).and(month_past.or(month.eq(m).and(day_ok))))
}

/// Keep rows whose date lies within `[start, end]`
///
/// Either bound may be `None`. The result has the input's columns and
/// types; when no row is removed the input frame is returned borrowed.
pub fn filter_by_date_range<'a>(
    frame: &'a DataFrame,
    start: Option<DateBound>,
    end: Option<DateBound>,
    columns: &DateColumns,
) -> Result<Cow<'a, DataFrame>> {
    if (start.is_none() && end.is_none()) || frame.height() == 0 {
        return Ok(Cow::Borrowed(frame));
    }

    let mask = match (start, end) {
        (Some(start), Some(end)) => {
            bound_expr(columns, start, false).and(bound_expr(columns, end, true))
        }
        (Some(start), None) => bound_expr(columns, start, false),
        (None, Some(end)) => bound_expr(columns, end, true),
        (None, None) => return Ok(Cow::Borrowed(frame)),
    };

    let filtered = frame.clone().lazy().filter(mask).collect()?;
    debug!("Date filter kept {} of {} rows", filtered.height(), frame.height());

    if filtered.height() == frame.height() {
        Ok(Cow::Borrowed(frame))
    } else {
        Ok(Cow::Owned(filtered))
    }
}

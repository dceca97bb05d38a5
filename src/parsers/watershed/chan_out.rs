//! `chan.out`: channel peak discharge per event.

use super::watershed_date_columns;
use crate::config::SentinelSet;
use crate::error::Result;
use crate::header::{TableLayout, read_source, read_table};
use crate::models::{Row, Value};
use crate::parsers::{calendar_year, date_from_julian};
use crate::schema::SchemaBuilder;

use arrow::datatypes::SchemaRef;
use std::path::Path;
use std::sync::LazyLock;

/// `Year Day Elmt_ID Chan_ID Inflow Time PeakDischarge`
const LAYOUT: TableLayout = TableLayout::new(7, 2);

static SCHEMA: LazyLock<SchemaRef> = LazyLock::new(|| {
    watershed_date_columns(SchemaBuilder::new())
        .int("Elmt_ID", "Watershed element id")
        .int("Chan_ID", "Channel id")
        .measure("Inflow (m^3)", "m^3", "Inflow volume to the channel")
        .measure("Time (hr)", "hr", "Time to peak")
        .measure("Peak_Discharge (m^3/s)", "m^3/s", "Peak discharge")
        .build()
});

pub fn schema() -> SchemaRef {
    SCHEMA.clone()
}

pub fn parse_file(
    path: &Path,
    sentinels: &SentinelSet,
    start_year: Option<i32>,
) -> Result<Vec<Row>> {
    let text = read_source(path)?;
    let (_, lines) = read_table(path, &text, LAYOUT, sentinels)?;

    lines
        .iter()
        .map(|line| {
            let raw_year = line.int(0, path)?;
            let date = date_from_julian(path, line, calendar_year(raw_year, start_year), 1)?;

            let mut row: Row = Vec::with_capacity(SCHEMA.fields().len());
            row.extend(date.cells());
            row.push(Value::from(raw_year));
            row.push(Value::from(line.int(2, path)?));
            row.push(Value::from(line.int(3, path)?));
            row.extend(line.values_from(4, 3));
            Ok(row)
        })
        .collect()
}

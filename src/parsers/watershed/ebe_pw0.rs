//! `ebe_pw0.txt`: event-by-event summary at the watershed outlet.

use super::watershed_date_columns;
use crate::config::SentinelSet;
use crate::error::Result;
use crate::header::{TableLayout, read_source, read_table};
use crate::models::{Row, Value};
use crate::parsers::{calendar_year, date_from_month_day};
use crate::schema::SchemaBuilder;

use arrow::datatypes::SchemaRef;
use std::path::Path;
use std::sync::LazyLock;

/// `Day Month Year Precip Runoff Peak Sediment SRP PP TP Elmt_ID`
const LAYOUT: TableLayout = TableLayout::new(11, 2);

const MEASURES: [(&str, &str, &str); 7] = [
    ("Precipitation Depth (mm)", "mm", "Event precipitation depth"),
    ("Runoff Volume (m^3)", "m^3", "Runoff volume at the outlet"),
    ("Peak Runoff (m^3/s)", "m^3/s", "Peak runoff rate at the outlet"),
    ("Sediment Yield (kg)", "kg", "Sediment yield at the outlet"),
    ("Soluble Reactive P (kg)", "kg", "Soluble reactive phosphorus"),
    ("Particulate P (kg)", "kg", "Particulate phosphorus"),
    ("Total P (kg)", "kg", "Total phosphorus"),
];

static SCHEMA: LazyLock<SchemaRef> = LazyLock::new(|| {
    MEASURES
        .iter()
        .fold(watershed_date_columns(SchemaBuilder::new()), |builder, (name, units, description)| {
            builder.measure(name, units, description)
        })
        .int("Elmt ID", "Watershed element the event was reported for")
        .build()
});

pub fn schema() -> SchemaRef {
    SCHEMA.clone()
}

/// Rows keep event order from the file
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
            let raw_year = line.int(2, path)?;
            let date = date_from_month_day(path, line, calendar_year(raw_year, start_year), 1, 0)?;

            let mut row: Row = Vec::with_capacity(SCHEMA.fields().len());
            row.extend(date.cells());
            row.push(Value::from(raw_year));
            row.extend(line.values_from(3, MEASURES.len()));
            row.push(Value::from(line.int(10, path)?));
            Ok(row)
        })
        .collect()
}

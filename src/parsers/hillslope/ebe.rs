//! `H<id>.ebe.dat`: event-by-event runoff and sediment summary.

use crate::config::SentinelSet;
use crate::error::Result;
use crate::header::{TableLayout, read_source, read_table};
use crate::models::{Row, Value};
use crate::parsers::{calendar_year, date_from_month_day, hillslope_id};
use crate::schema::SchemaBuilder;

use arrow::datatypes::SchemaRef;
use std::path::Path;
use std::sync::LazyLock;

const LAYOUT: TableLayout = TableLayout::new(14, 2);

const MEASURES: [(&str, &str, &str); 11] = [
    ("Precip (mm)", "mm", "Event precipitation"),
    ("Runoff (mm)", "mm", "Event runoff depth"),
    ("IR-det (kg/m^2)", "kg/m^2", "Interrill detachment"),
    ("Av-det (kg/m^2)", "kg/m^2", "Average detachment"),
    ("Mx-det (kg/m^2)", "kg/m^2", "Maximum detachment"),
    ("Det-Point (m)", "m", "Location of maximum detachment"),
    ("Av-dep (kg/m^2)", "kg/m^2", "Average deposition"),
    ("Max-dep (kg/m^2)", "kg/m^2", "Maximum deposition"),
    ("Dep-Point (m)", "m", "Location of maximum deposition"),
    ("Sed.Del (kg/m)", "kg/m", "Sediment delivered per unit width"),
    ("ER", "", "Enrichment ratio"),
];

static SCHEMA: LazyLock<SchemaRef> = LazyLock::new(|| {
    MEASURES
        .iter()
        .fold(
            SchemaBuilder::new()
                .int("wepp_id", "Hillslope id from the source filename")
                .date_columns(),
            |builder, (name, units, description)| builder.measure(name, units, description),
        )
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
    let wepp_id = hillslope_id(path)?;
    let text = read_source(path)?;
    let (_, lines) = read_table(path, &text, LAYOUT, sentinels)?;

    lines
        .iter()
        .map(|line| {
            let year = calendar_year(line.int(2, path)?, start_year);
            let date = date_from_month_day(path, line, year, 1, 0)?;

            let mut row: Row = Vec::with_capacity(7 + MEASURES.len());
            row.push(Value::from(wepp_id));
            row.extend(date.cells());
            row.extend(line.values_from(3, MEASURES.len()));
            Ok(row)
        })
        .collect()
}

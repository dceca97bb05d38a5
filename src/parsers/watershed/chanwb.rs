//! `chanwb.out`: daily channel water balance.

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

/// `Year Day Elmt_ID Chan_ID Inflow Outflow Storage Baseflow Loss Balance`
const LAYOUT: TableLayout = TableLayout::new(10, 2);

const MEASURES: [(&str, &str, &str); 6] = [
    ("Inflow (m^3)", "m^3", "Channel inflow volume"),
    ("Outflow (m^3)", "m^3", "Channel outflow volume"),
    ("Storage (m^3)", "m^3", "Water stored in the channel"),
    ("Baseflow (m^3)", "m^3", "Baseflow volume"),
    ("Loss (m^3)", "m^3", "Transmission loss"),
    ("Balance (m^3)", "m^3", "Water balance residual"),
];

static SCHEMA: LazyLock<SchemaRef> = LazyLock::new(|| {
    MEASURES
        .iter()
        .fold(
            watershed_date_columns(SchemaBuilder::new())
                .int("Elmt_ID", "Watershed element id")
                .int("Chan_ID", "Channel id"),
            |builder, (name, units, description)| builder.measure(name, units, description),
        )
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

    let mut keyed = Vec::with_capacity(lines.len());
    for line in &lines {
        let raw_year = line.int(0, path)?;
        let date = date_from_julian(path, line, calendar_year(raw_year, start_year), 1)?;
        let chan_id = line.int(3, path)?;

        let mut row: Row = Vec::with_capacity(SCHEMA.fields().len());
        row.extend(date.cells());
        row.push(Value::from(raw_year));
        row.push(Value::from(line.int(2, path)?));
        row.push(Value::from(chan_id));
        row.extend(line.values_from(4, MEASURES.len()));
        keyed.push(((date.year, date.julian, chan_id), row));
    }
    keyed.sort_by_key(|(key, _)| *key);
    Ok(keyed.into_iter().map(|(_, row)| row).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = "\
 Annual channel water balance
 Year  Day  Elmt_ID  Chan_ID  Inflow  Outflow  Storage  Baseflow  Loss  Balance
                              (m^3)   (m^3)    (m^3)    (m^3)     (m^3) (m^3)
 -------------------------------------------------------------------------
 2003   1   5   2   10.0   9.0   1.0   0.0   0.0   0.0
 2003   1   4   1   20.0  18.0   2.0   0.0   0.0   0.0
 2003   2   4   1   15.0  15.0   2.0   0.0   0.0   0.0
";

    #[test]
    fn test_rows_sorted_by_day_then_channel() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("chanwb.out");
        std::fs::write(&path, SAMPLE).unwrap();

        // calendar years pass through unchanged
        let rows = parse_file(&path, &SentinelSet::default(), Some(2000)).unwrap();
        let schema = schema();
        let chan = schema.index_of("Chan_ID").unwrap();
        let year = schema.index_of("year").unwrap();

        let order: Vec<_> = rows.iter().map(|r| r[chan].clone()).collect();
        assert_eq!(order, vec![Value::Int(1), Value::Int(2), Value::Int(1)]);
        assert!(rows.iter().all(|r| r[year] == Value::Int(2003)));
    }
}

//! `H<id>.pass.dat`: hillslope PASS event, subevent and no-event records.

use crate::config::SentinelSet;
use crate::error::{InterchangeError, Result};
use crate::header::read_source;
use crate::models::{DateParts, Row, Value};
use crate::parsers::pass_record::{
    PassRecord, pass_measure_columns, read_pass_records, starts_record,
};
use crate::parsers::{calendar_year, hillslope_id};
use crate::schema::SchemaBuilder;

use arrow::datatypes::SchemaRef;
use std::path::Path;
use std::sync::LazyLock;

static SCHEMA: LazyLock<SchemaRef> = LazyLock::new(|| {
    pass_measure_columns(
        SchemaBuilder::new()
            .int("wepp_id", "Hillslope id from the source filename")
            .text("event", "Record kind: EVENT, SUBEVENT or NO EVENT")
            .date_columns(),
    )
    .build()
});

pub fn schema() -> SchemaRef {
    SCHEMA.clone()
}

pub(crate) fn record_date(path: &Path, record: &PassRecord, year: i32) -> Result<DateParts> {
    u32::try_from(record.julian)
        .ok()
        .and_then(|julian| DateParts::resolve_year_julian(year, julian))
        .ok_or_else(|| {
            InterchangeError::malformed(
                path,
                record.line_no,
                format!("day {} is not a day of year {}", record.julian, year),
            )
        })
}

/// Rows keep record order from the file
pub fn parse_file(
    path: &Path,
    sentinels: &SentinelSet,
    start_year: Option<i32>,
) -> Result<Vec<Row>> {
    let wepp_id = hillslope_id(path)?;
    let text = read_source(path)?;
    let lines: Vec<&str> = text.lines().collect();

    let Some(first) = lines.iter().position(|line| starts_record(line)) else {
        return Ok(Vec::new());
    };

    read_pass_records(path, &lines, first, false, sentinels)?
        .into_iter()
        .map(|record| {
            let date = record_date(path, &record, calendar_year(record.year, start_year))?;
            let mut row: Row = Vec::with_capacity(SCHEMA.fields().len());
            row.push(Value::from(wepp_id));
            row.push(Value::from(record.kind().label()));
            row.extend(date.cells());
            row.extend(record.measure_cells());
            Ok(row)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = "\
 WEPP hillslope PASS file
 VERSION 2012.8
 1 OFE
SUBEVENT 1 46 0.002 20.0 0.001 5.0 0.0 0.0 0.0 0.0 0.0 0.0 0.0 0.0 0.0 0.0 1.0 0.25
NO EVENT 1 47 0.75 0.1
NO EVENT 1 48 0.70 0.1
";

    #[test]
    fn test_event_categories() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("H4.pass.dat");
        std::fs::write(&path, SAMPLE).unwrap();

        let rows = parse_file(&path, &SentinelSet::default(), None).unwrap();
        let schema = schema();
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.len() == schema.fields().len()));

        let event = schema.index_of("event").unwrap();
        let kinds: Vec<&Value> = rows.iter().map(|r| &r[event]).collect();
        assert_eq!(
            kinds,
            vec![
                &Value::from("SUBEVENT"),
                &Value::from("NO EVENT"),
                &Value::from("NO EVENT")
            ]
        );

        for name in ["runoff", "sbrunf", "sbrunv", "drainq", "drrunv"] {
            let idx = schema.index_of(name).unwrap();
            for row in rows.iter().filter(|r| r[event] == Value::from("NO EVENT")) {
                assert_eq!(row[idx], Value::Float(0.0), "{}", name);
            }
        }
        let drainq = schema.index_of("drainq").unwrap();
        assert_eq!(rows[0][drainq], Value::Float(0.001));
    }

    #[test]
    fn test_file_without_records() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("H4.pass.dat");
        std::fs::write(&path, " header only\n").unwrap();
        assert!(parse_file(&path, &SentinelSet::default(), None).unwrap().is_empty());
    }

    #[test]
    fn test_day_366_of_a_simulation_year() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("H4.pass.dat");
        std::fs::write(&path, format!("{}NO EVENT 1 366 0.70 0.1\n", SAMPLE)).unwrap();
        let schema = schema();
        let idx = |name: &str| schema.index_of(name).unwrap();

        let rows = parse_file(&path, &SentinelSet::default(), Some(2000)).unwrap();
        let last = &rows[3];
        assert_eq!(last[idx("year")], Value::Int(2000));
        assert_eq!(last[idx("julian")], Value::Int(366));
        assert_eq!(last[idx("month")], Value::Int(12));
        assert_eq!(last[idx("day_of_month")], Value::Int(31));

        let rows = parse_file(&path, &SentinelSet::default(), None).unwrap();
        assert_eq!(rows[3][idx("year")], Value::Int(1));
        assert_eq!(rows[3][idx("julian")], Value::Int(366));
    }
}

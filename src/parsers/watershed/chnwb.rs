//! `chnwb.txt`: channel OFE water balance, laid out like the hillslope `wat` file.

use super::watershed_date_columns;
use crate::config::SentinelSet;
use crate::error::Result;
use crate::header::{read_source, read_table};
use crate::models::{Row, Value};
use crate::parsers::hillslope::wat::{LAYOUT, WATER_BALANCE_MEASURES, water_balance_measures};
use crate::parsers::{calendar_year, date_from_julian};
use crate::schema::SchemaBuilder;

use arrow::datatypes::SchemaRef;
use std::path::Path;
use std::sync::LazyLock;

static SCHEMA: LazyLock<SchemaRef> = LazyLock::new(|| {
    water_balance_measures(watershed_date_columns(
        SchemaBuilder::new().int("Elmt_ID", "Channel element id"),
    ))
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
        let elmt_id = line.int(0, path)?;
        let raw_year = line.int(2, path)?;
        let date = date_from_julian(path, line, calendar_year(raw_year, start_year), 1)?;

        let mut row: Row = Vec::with_capacity(SCHEMA.fields().len());
        row.push(Value::from(elmt_id));
        row.extend(date.cells());
        row.push(Value::from(raw_year));
        row.extend(line.values_from(3, WATER_BALANCE_MEASURES.len()));
        keyed.push(((date.year, date.julian, elmt_id), row));
    }
    keyed.sort_by_key(|(key, _)| *key);
    Ok(keyed.into_iter().map(|(_, row)| row).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = "\
 Channel water balance
 OFE  J  Y  P  RM  Q  Ep  Es  Er  Dp  UpStrmQ  SubRIn  latqcc  Total-Soil  frozwt  Snow-Water  QOFE  Tile  Irr  Area
 ----------------------------------------------------------------------------
  4  1  1  3.2  3.2  0.0  0.1  0.4  0.0  0.0  0.0  0.0  0.0  250.1  0.0  0.0  0.5  0.0  0.0  500.0
";

    #[test]
    fn test_channel_element_and_years() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("chnwb.txt");
        std::fs::write(&path, SAMPLE).unwrap();

        let rows = parse_file(&path, &SentinelSet::default(), Some(1990)).unwrap();
        let schema = schema();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].len(), schema.fields().len());
        assert_eq!(rows[0][0], Value::Int(4));
        assert_eq!(rows[0][schema.index_of("year").unwrap()], Value::Int(1990));
        assert_eq!(rows[0][schema.index_of("QOFE (mm)").unwrap()], Value::Float(0.5));
    }
}
